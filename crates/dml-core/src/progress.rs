//! Aggregate progress counters shared by every running scanner.
//!
//! Counters only grow. Consumers poll `snapshot()`; nothing is pushed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for messages scanned and attachments discovered/downloaded/failed.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    messages_scanned: AtomicU64,
    attachments_discovered: AtomicU64,
    attachments_downloaded: AtomicU64,
    attachments_failed: AtomicU64,
}

/// Point-in-time view of the aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub messages_scanned: u64,
    pub attachments_discovered: u64,
    pub attachments_downloaded: u64,
    pub attachments_failed: u64,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_scanned(&self) {
        self.messages_scanned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn attachment_discovered(&self) {
        self.attachments_discovered.fetch_add(1, Ordering::SeqCst);
    }

    /// Must follow the matching `attachment_discovered` call.
    pub fn attachment_downloaded(&self) {
        self.attachments_downloaded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn attachment_failed(&self) {
        self.attachments_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the counters. `downloaded` is loaded before `discovered`, so the snapshot
    /// never shows more downloads than discoveries even while scanners are running.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let attachments_downloaded = self.attachments_downloaded.load(Ordering::SeqCst);
        let attachments_failed = self.attachments_failed.load(Ordering::SeqCst);
        let attachments_discovered = self.attachments_discovered.load(Ordering::SeqCst);
        let messages_scanned = self.messages_scanned.load(Ordering::SeqCst);
        ProgressSnapshot {
            messages_scanned,
            attachments_discovered,
            attachments_downloaded,
            attachments_failed,
        }
    }
}

impl ProgressSnapshot {
    /// Discovered attachments not (yet) downloaded: skipped, failed or in flight.
    pub fn open(&self) -> u64 {
        self.attachments_discovered
            .saturating_sub(self.attachments_downloaded)
    }

    /// Downloaded share of discovered attachments, 0..=100. Zero when nothing was discovered.
    pub fn percent(&self) -> u8 {
        if self.attachments_discovered == 0 {
            return 0;
        }
        let pct = self.attachments_downloaded.saturating_mul(100) / self.attachments_discovered;
        pct.min(100) as u8
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scanned: {} Downloaded: {} Open: {}",
            self.messages_scanned,
            self.attachments_downloaded,
            self.open()
        )
    }
}
