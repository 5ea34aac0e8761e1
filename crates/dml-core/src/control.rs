//! Cooperative cancellation for running jobs.
//!
//! Each running job owns an `AbortToken`. The scheduler trips it on stop/remove;
//! the scanner checks it at message and attachment boundaries, the downloader
//! checks it between writes, and sleeping code wakes up through `cancelled()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Error returned when work is stopped by the scheduler (stop/remove/shutdown).
#[derive(Debug)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted")
    }
}

impl std::error::Error for JobAborted {}

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

/// Shared abort flag for one job run. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    inner: Arc<Inner>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort and wake every task waiting in `cancelled()`.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// `Err(JobAborted)` once abort was requested.
    pub fn check(&self) -> Result<(), JobAborted> {
        if self.is_aborted() {
            Err(JobAborted)
        } else {
            Ok(())
        }
    }

    /// Resolves once `abort` has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so an abort in between is not missed.
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `d` unless aborted first. Returns false when woken by abort.
    pub async fn sleep(&self, d: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(d) => !self.is_aborted(),
            _ = self.cancelled() => false,
        }
    }

    /// Blocking variant of `sleep` for code running on a blocking thread.
    pub fn sleep_blocking(&self, d: std::time::Duration) -> bool {
        const TICK: std::time::Duration = std::time::Duration::from_millis(50);
        let deadline = std::time::Instant::now() + d;
        loop {
            if self.is_aborted() {
                return false;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(TICK));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_wakes_after_abort() {
        let token = AbortToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.abort();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert!(token.check().is_err());
    }

    #[tokio::test]
    async fn sleep_returns_false_when_aborted() {
        let token = AbortToken::new();
        token.abort();
        assert!(!token.sleep(Duration::from_secs(60)).await);
        assert!(!token.sleep_blocking(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn sleep_completes_without_abort() {
        let token = AbortToken::new();
        assert!(token.sleep(Duration::from_millis(5)).await);
        assert!(token.sleep_blocking(Duration::from_millis(5)));
    }
}
