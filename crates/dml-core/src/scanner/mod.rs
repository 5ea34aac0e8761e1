//! Per-job channel scanner.
//!
//! Walks a channel's history oldest to newest (backfill), then keeps polling
//! for new messages (live tail). Every message and attachment is reported to
//! the shared `ProgressAggregator`; attachments are downloaded one at a time
//! in message order.

mod process;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::control::AbortToken;
use crate::downloader::Downloader;
use crate::naming::FileNameScheme;
use crate::platform::{resolve_channel, ChannelNames, ChatPlatform, JobKey, MessageId, PlatformError};
use crate::progress::ProgressAggregator;
use crate::retry::{classify_platform_error, retry_async, Retried, RetryPolicy};

/// Errors that end a scan. Per-attachment failures are counted, not returned.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Platform session invalid. Fatal for every job.
    #[error("platform session is not authorized")]
    Authentication,
    /// Channel unreadable or removed. Fatal for this job only.
    #[error("channel not accessible: {0}")]
    Permission(String),
    /// Local disk failure in the operating folder. Fatal for this job only.
    #[error("disk error at {}: {source}", path.display())]
    Disk { path: PathBuf, source: io::Error },
    #[error("invalid settings: {0}")]
    Settings(String),
    /// Stopped by the scheduler.
    #[error("scan aborted")]
    Aborted,
}

/// Per-run counters, mirrored into the aggregate progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub messages: u64,
    pub discovered: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Newest message processed.
    pub last_message: Option<MessageId>,
    pub backfill_complete: bool,
}

/// Scans one channel for one job run.
pub struct ChannelScanner {
    key: JobKey,
    settings: Arc<Settings>,
    scheme: FileNameScheme,
    platform: Arc<dyn ChatPlatform>,
    downloader: Downloader,
    progress: Arc<ProgressAggregator>,
    abort: AbortToken,
    page_policy: RetryPolicy,
}

impl ChannelScanner {
    pub fn new(
        key: JobKey,
        settings: Arc<Settings>,
        platform: Arc<dyn ChatPlatform>,
        downloader: Downloader,
        progress: Arc<ProgressAggregator>,
        abort: AbortToken,
    ) -> Result<Self, ScanError> {
        let scheme = FileNameScheme::parse(&settings.file_name_scheme)
            .map_err(|e| ScanError::Settings(e.to_string()))?;
        let page_policy = RetryPolicy::from(&settings.retry);
        Ok(Self {
            key,
            settings,
            scheme,
            platform,
            downloader,
            progress,
            abort,
            page_policy,
        })
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.scan.poll_interval_secs)
    }

    /// Run backfill, then live tail until aborted (or until the end of history when
    /// live tail is disabled).
    pub async fn run(&self) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();
        let names = self.resolve_names().await?;
        tracing::info!(
            guild = %self.key.guild,
            channel = %self.key.channel,
            "scanning #{} in {}",
            names.channel,
            names.guild
        );

        let page_size = self.settings.scan.page_size;
        let channel = self.key.channel;
        loop {
            self.checkpoint()?;
            let cursor = summary.last_message;
            let page = self
                .platform_call("history page", || {
                    self.platform.messages_after(channel, cursor, page_size)
                })
                .await?;
            let Some(page) = page else {
                self.idle().await?;
                continue;
            };
            // A page holding only already-processed ids is the end of history too.
            let page: Vec<_> = page
                .into_iter()
                .filter(|m| cursor.map_or(true, |last| m.id > last))
                .collect();

            if page.is_empty() {
                if !summary.backfill_complete {
                    summary.backfill_complete = true;
                    tracing::info!(
                        channel = %channel,
                        messages = summary.messages,
                        downloaded = summary.downloaded,
                        "backfill complete"
                    );
                    if !self.settings.scan.live_tail {
                        return Ok(summary);
                    }
                }
                self.idle().await?;
                continue;
            }

            for message in page {
                self.checkpoint()?;
                if summary.last_message.is_some_and(|last| message.id <= last) {
                    continue;
                }
                self.process_message(&names, &message, &mut summary).await?;
                summary.last_message = Some(message.id);
            }
        }
    }

    async fn resolve_names(&self) -> Result<ChannelNames, ScanError> {
        loop {
            let names = self
                .platform_call("channel lookup", || {
                    resolve_channel(self.platform.as_ref(), self.key)
                })
                .await?;
            match names {
                Some(n) => return Ok(n),
                None => self.idle().await?,
            }
        }
    }

    /// Retry a platform call. `Ok(None)` means transient failures exhausted the
    /// budget: the caller waits one poll interval and tries again.
    async fn platform_call<T, F, Fut>(&self, what: &str, f: F) -> Result<Option<T>, ScanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        match retry_async(&self.page_policy, &self.abort, classify_platform_error, f).await {
            Ok(v) => Ok(Some(v)),
            Err(Retried::Aborted) => Err(ScanError::Aborted),
            Err(Retried::Failed {
                error, attempts, ..
            }) => match error {
                PlatformError::Unauthorized => Err(ScanError::Authentication),
                PlatformError::Forbidden(what) | PlatformError::NotFound(what) => {
                    Err(ScanError::Permission(what))
                }
                other => {
                    tracing::warn!(channel = %self.key.channel, attempts, "{} failed: {}", what, other);
                    Ok(None)
                }
            },
        }
    }

    fn checkpoint(&self) -> Result<(), ScanError> {
        self.abort.check().map_err(|_| ScanError::Aborted)
    }

    async fn idle(&self) -> Result<(), ScanError> {
        if self.abort.sleep(self.poll_interval()).await {
            Ok(())
        } else {
            Err(ScanError::Aborted)
        }
    }
}
