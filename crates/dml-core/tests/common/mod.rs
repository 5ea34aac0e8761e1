#![allow(dead_code)]

pub mod fake_fetcher;
pub mod fake_platform;
pub mod flaky_server;

use std::path::Path;
use std::time::Duration;

use dml_core::config::Settings;
use dml_core::platform::{ChannelId, GuildId, JobKey};

pub fn key(guild: u64, channel: u64) -> JobKey {
    JobKey::new(GuildId(guild), ChannelId(channel))
}

/// Settings for tests: fast retries, long poll interval.
pub fn settings(root: &Path, thread_limit: usize, live_tail: bool) -> Settings {
    let mut s = Settings {
        operating_folder: root.to_path_buf(),
        thread_limit,
        ..Settings::default()
    };
    s.retry.max_attempts = 4;
    s.retry.base_delay_secs = 0.001;
    s.retry.max_delay_secs = 1;
    s.scan.poll_interval_secs = 3600;
    s.scan.live_tail = live_tail;
    s
}

/// Poll `cond` every 10ms for up to 5s.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
