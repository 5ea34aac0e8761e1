//! Body of one job run: wait for a slot, scan, record the outcome.

use std::sync::{Arc, PoisonError};

use crate::control::AbortToken;
use crate::downloader::Downloader;
use crate::platform::JobKey;
use crate::retry::RetryPolicy;
use crate::scanner::{ChannelScanner, ScanError};

use super::{Inner, JobStatus};

/// Records a failure if the run unwinds before reporting its outcome.
struct FinishGuard {
    inner: Arc<Inner>,
    key: JobKey,
    run_id: u64,
    done: bool,
}

impl FinishGuard {
    fn finish(mut self, status: JobStatus) {
        self.done = true;
        finish(&self.inner, self.key, self.run_id, status);
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.done {
            finish(
                &self.inner,
                self.key,
                self.run_id,
                JobStatus::Failed("worker panicked".into()),
            );
        }
    }
}

/// Leave RunningJobs and set the final status, unless a newer run or a
/// stop call already took over the entry.
fn finish(inner: &Inner, key: JobKey, run_id: u64, status: JobStatus) {
    let mut state = inner.state();
    if state.running.get(&key).is_some_and(|r| r.run_id == run_id) {
        state.running.remove(&key);
        if state.contains(key) {
            state.status.insert(key, status);
        }
    }
}

fn set_running(inner: &Inner, key: JobKey, run_id: u64) -> bool {
    let mut state = inner.state();
    if state.running.get(&key).is_some_and(|r| r.run_id == run_id) {
        state.status.insert(key, JobStatus::Running);
        true
    } else {
        false
    }
}

pub(super) async fn run_job(inner: Arc<Inner>, key: JobKey, run_id: u64, abort: AbortToken) {
    let guard = FinishGuard {
        inner: Arc::clone(&inner),
        key,
        run_id,
        done: false,
    };

    let slot = tokio::select! {
        slot = inner.pool.acquire() => slot,
        _ = abort.cancelled() => {
            guard.finish(JobStatus::Idle);
            return;
        }
    };
    let slot = match slot {
        Ok(s) => s,
        Err(_closed) => {
            tracing::debug!(guild = %key.guild, channel = %key.channel, "pool closed before job started");
            guard.finish(JobStatus::Idle);
            return;
        }
    };
    if !set_running(&inner, key, run_id) {
        guard.finish(JobStatus::Idle);
        return;
    }

    let settings = inner.settings();
    let downloader = Downloader::new(
        Arc::clone(&inner.fetcher),
        RetryPolicy::from(&settings.retry),
    );
    tracing::info!(guild = %key.guild, channel = %key.channel, run_id, "job started");
    let result = match ChannelScanner::new(
        key,
        settings,
        Arc::clone(&inner.platform),
        downloader,
        Arc::clone(&inner.progress),
        abort,
    ) {
        Ok(scanner) => scanner.run().await,
        Err(e) => Err(e),
    };
    drop(slot);

    match result {
        Ok(summary) => {
            tracing::info!(
                guild = %key.guild,
                channel = %key.channel,
                messages = summary.messages,
                downloaded = summary.downloaded,
                skipped = summary.skipped,
                failed = summary.failed,
                "job completed"
            );
            guard.finish(JobStatus::Completed);
        }
        Err(ScanError::Aborted) => {
            tracing::info!(guild = %key.guild, channel = %key.channel, "job stopped");
            guard.finish(JobStatus::Idle);
        }
        Err(ScanError::Authentication) => {
            let reason = ScanError::Authentication.to_string();
            tracing::error!(guild = %key.guild, channel = %key.channel, "{}; stopping all jobs", reason);
            *inner.fatal.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
            guard.finish(JobStatus::Failed(reason));
            let inner = Arc::clone(&inner);
            tokio::spawn(async move { super::stop_all(&inner).await });
        }
        Err(e) => {
            tracing::error!(guild = %key.guild, channel = %key.channel, "job failed: {}", e);
            guard.finish(JobStatus::Failed(e.to_string()));
        }
    }
}
