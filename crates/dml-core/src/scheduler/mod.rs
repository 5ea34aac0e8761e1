//! Job scheduler.
//!
//! Owns the job list and a bounded worker pool. Each started job gets its own
//! tokio task running a `ChannelScanner`; the task holds a pool slot for as
//! long as it scans. Per-job failures are recorded in the job's status and
//! never affect sibling jobs. An authentication failure stops everything.

mod pool;
mod status;
mod worker;

pub use pool::{PoolClosed, PoolSlot, WorkerPool};
pub use status::{AddOutcome, JobStatus, JobView, StartOutcome};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::control::AbortToken;
use crate::job_store::{Job, JobStore};
use crate::platform::{ChatPlatform, Fetcher, JobKey};
use crate::progress::{ProgressAggregator, ProgressSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no job for channel {0}")]
    UnknownJob(JobKey),
    #[error("scheduler is shut down")]
    ShutDown,
    /// A previous run hit an authentication failure; cleared by `clear_fatal_error`.
    #[error("platform session is not authorized: {0}")]
    Unauthorized(String),
    #[error("invalid settings: {0:#}")]
    Settings(anyhow::Error),
    #[error("job store: {0:#}")]
    Store(anyhow::Error),
}

struct RunningJob {
    run_id: u64,
    abort: AbortToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    /// Job list in insertion order.
    jobs: Vec<Job>,
    status: HashMap<JobKey, JobStatus>,
    running: HashMap<JobKey, RunningJob>,
}

impl State {
    fn contains(&self, key: JobKey) -> bool {
        self.jobs.iter().any(|j| j.key == key)
    }
}

struct Inner {
    store: JobStore,
    platform: Arc<dyn ChatPlatform>,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<ProgressAggregator>,
    settings: RwLock<Arc<Settings>>,
    pool: WorkerPool,
    state: Mutex<State>,
    next_run: AtomicU64,
    fatal: Mutex<Option<String>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Cheap to clone; clones share the same job list and pool.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        settings: Settings,
        store: JobStore,
        platform: Arc<dyn ChatPlatform>,
        fetcher: Arc<dyn Fetcher>,
        progress: Arc<ProgressAggregator>,
    ) -> Result<Self, SchedulerError> {
        settings.validate().map_err(SchedulerError::Settings)?;
        let pool = WorkerPool::new(settings.thread_limit);
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                platform,
                fetcher,
                progress,
                settings: RwLock::new(Arc::new(settings)),
                pool,
                state: Mutex::new(State::default()),
                next_run: AtomicU64::new(1),
                fatal: Mutex::new(None),
            }),
        })
    }

    /// Replace the job list with the persisted jobs. Nothing is started.
    pub async fn load_jobs(&self) -> Result<usize, SchedulerError> {
        let jobs = self.inner.store.load_all().await.map_err(SchedulerError::Store)?;
        let mut state = self.inner.state();
        for job in &jobs {
            state.status.entry(job.key).or_insert(JobStatus::Idle);
        }
        state.jobs = jobs;
        tracing::info!(jobs = state.jobs.len(), "job list loaded");
        Ok(state.jobs.len())
    }

    /// Append a job and persist it. Does not start it.
    pub async fn add(&self, key: JobKey) -> Result<AddOutcome, SchedulerError> {
        if self.inner.state().contains(key) {
            return Ok(AddOutcome::AlreadyExists);
        }
        let job = Job::new(key);
        self.inner.store.save(&job).await.map_err(SchedulerError::Store)?;

        let mut state = self.inner.state();
        if state.contains(key) {
            return Ok(AddOutcome::AlreadyExists);
        }
        state.jobs.push(job);
        state.status.insert(key, JobStatus::Idle);
        tracing::info!(guild = %key.guild, channel = %key.channel, "job added");
        Ok(AddOutcome::Added)
    }

    /// Stop the job if running, then drop it from the list and the store.
    /// Returns once the worker has released its slot and stopped writing.
    pub async fn remove(&self, key: JobKey) -> Result<bool, SchedulerError> {
        let (existed, running) = {
            let mut state = self.inner.state();
            let before = state.jobs.len();
            state.jobs.retain(|j| j.key != key);
            state.status.remove(&key);
            (state.jobs.len() != before, state.running.remove(&key))
        };
        if let Some(run) = running {
            stop_run(key, run).await;
        }
        let deleted = self.inner.store.delete(key).await.map_err(SchedulerError::Store)?;
        if existed || deleted {
            tracing::info!(guild = %key.guild, channel = %key.channel, "job removed");
        }
        Ok(existed || deleted)
    }

    /// Spawn a worker for `key`. It queues for a pool slot before scanning.
    pub fn start(&self, key: JobKey) -> Result<StartOutcome, SchedulerError> {
        if self.inner.pool.is_closed() {
            return Err(SchedulerError::ShutDown);
        }
        if let Some(reason) = self.fatal_error() {
            return Err(SchedulerError::Unauthorized(reason));
        }
        let mut state = self.inner.state();
        if !state.contains(key) {
            return Err(SchedulerError::UnknownJob(key));
        }
        if state.running.contains_key(&key) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let run_id = self.inner.next_run.fetch_add(1, Ordering::Relaxed);
        let abort = AbortToken::new();
        state.status.insert(key, JobStatus::Queued);
        // Registered under the same lock, so the worker always finds its entry.
        let handle = tokio::spawn(worker::run_job(
            Arc::clone(&self.inner),
            key,
            run_id,
            abort.clone(),
        ));
        state.running.insert(
            key,
            RunningJob {
                run_id,
                abort,
                handle,
            },
        );
        tracing::debug!(guild = %key.guild, channel = %key.channel, run_id, "job queued");
        Ok(StartOutcome::Started)
    }

    /// Start every job in the list. Returns how many were newly started.
    pub fn start_all(&self) -> Result<usize, SchedulerError> {
        let keys: Vec<JobKey> = self.inner.state().jobs.iter().map(|j| j.key).collect();
        let mut started = 0;
        for key in keys {
            if self.start(key)? == StartOutcome::Started {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Stop one job and wait for its worker to finish. The job stays in the list.
    pub async fn stop(&self, key: JobKey) -> bool {
        let run = self.inner.state().running.remove(&key);
        match run {
            Some(run) => {
                stop_run(key, run).await;
                self.set_status_if_listed(key, JobStatus::Idle);
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        stop_all(&self.inner).await;
    }

    /// Validate and swap the settings, then resize the pool. Running scans keep the
    /// snapshot they started with.
    pub fn apply_settings(&self, settings: Settings) -> Result<(), SchedulerError> {
        settings.validate().map_err(SchedulerError::Settings)?;
        let thread_limit = settings.thread_limit;
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
        self.inner.pool.resize(thread_limit);
        tracing::info!(thread_limit, "settings applied");
        Ok(())
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.inner.settings()
    }

    pub fn jobs(&self) -> Vec<JobView> {
        let state = self.inner.state();
        state
            .jobs
            .iter()
            .map(|job| JobView {
                job: *job,
                status: state.status.get(&job.key).cloned().unwrap_or(JobStatus::Idle),
            })
            .collect()
    }

    pub fn status(&self, key: JobKey) -> Option<JobStatus> {
        self.inner.state().status.get(&key).cloned()
    }

    /// True while the job has a worker (queued or scanning).
    pub fn is_running(&self, key: JobKey) -> bool {
        self.inner.state().running.contains_key(&key)
    }

    pub fn running_jobs(&self) -> Vec<JobKey> {
        let mut keys: Vec<JobKey> = self.inner.state().running.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Workers currently holding a pool slot.
    pub fn executing(&self) -> usize {
        self.inner.pool.in_use()
    }

    pub fn pool_capacity(&self) -> usize {
        self.inner.pool.capacity()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.progress.snapshot()
    }

    pub fn fatal_error(&self) -> Option<String> {
        self.inner
            .fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_fatal_error(&self) {
        *self.inner.fatal.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.pool.is_closed()
    }

    /// Refuse new starts and stop every running job.
    pub async fn shutdown(&self) {
        self.inner.pool.close();
        stop_all(&self.inner).await;
        tracing::info!("scheduler shut down");
    }

    fn set_status_if_listed(&self, key: JobKey, status: JobStatus) {
        let mut state = self.inner.state();
        if state.contains(key) {
            state.status.insert(key, status);
        }
    }
}

async fn stop_run(key: JobKey, run: RunningJob) {
    run.abort.abort();
    if let Err(e) = run.handle.await {
        if e.is_panic() {
            tracing::error!(guild = %key.guild, channel = %key.channel, "worker panicked");
        }
    }
}

async fn stop_all(inner: &Inner) {
    let runs: Vec<(JobKey, RunningJob)> = {
        let mut state = inner.state();
        let runs: Vec<_> = state.running.drain().collect();
        for (key, _) in &runs {
            if state.status.get(key).is_some_and(JobStatus::is_active) {
                state.status.insert(*key, JobStatus::Idle);
            }
        }
        runs
    };
    if runs.is_empty() {
        return;
    }
    tracing::info!(jobs = runs.len(), "stopping all jobs");
    for (_, run) in &runs {
        run.abort.abort();
    }
    for (key, run) in runs {
        stop_run(key, run).await;
    }
}
