//! Application context: the settings, store, progress counters and scheduler
//! built once at startup and handed to whatever drives the core.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::job_store::JobStore;
use crate::platform::{ChatPlatform, Fetcher};
use crate::progress::{ProgressAggregator, ProgressSnapshot};
use crate::scheduler::Scheduler;

pub struct AppContext {
    store: JobStore,
    progress: Arc<ProgressAggregator>,
    scheduler: Scheduler,
}

impl AppContext {
    /// Wire the components together. The job list starts empty.
    pub fn new(
        settings: Settings,
        store: JobStore,
        platform: Arc<dyn ChatPlatform>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let progress = Arc::new(ProgressAggregator::new());
        let scheduler = Scheduler::new(
            settings,
            store.clone(),
            platform,
            fetcher,
            Arc::clone(&progress),
        )
        .context("create scheduler")?;
        Ok(Self {
            store,
            progress,
            scheduler,
        })
    }

    /// `new`, then load persisted jobs. Loaded jobs are not started.
    pub async fn startup(
        settings: Settings,
        store: JobStore,
        platform: Arc<dyn ChatPlatform>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let ctx = Self::new(settings, store, platform, fetcher)?;
        let loaded = ctx.scheduler.load_jobs().await.context("load jobs")?;
        tracing::debug!(loaded, "application context ready");
        Ok(ctx)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Stop every job, close the pool, then close the store.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.store.close().await;
    }
}
