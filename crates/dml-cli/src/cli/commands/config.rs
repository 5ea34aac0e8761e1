//! `dml config show|set` – inspect and change settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dml_core::config::{self, Settings};

/// Fields `config set` may change; `None` leaves the value as is.
#[derive(Debug, Default)]
pub struct ConfigChanges {
    pub operating_folder: Option<PathBuf>,
    pub scheme: Option<String>,
    pub skip_existing: Option<bool>,
    pub thread_limit: Option<usize>,
}

impl ConfigChanges {
    pub fn is_empty(&self) -> bool {
        self.operating_folder.is_none()
            && self.scheme.is_none()
            && self.skip_existing.is_none()
            && self.thread_limit.is_none()
    }

    pub fn apply(self, settings: &mut Settings) {
        if let Some(folder) = self.operating_folder {
            settings.operating_folder = folder;
        }
        if let Some(scheme) = self.scheme {
            settings.file_name_scheme = scheme;
        }
        if let Some(skip) = self.skip_existing {
            settings.skip_existing_files = skip;
        }
        if let Some(limit) = self.thread_limit {
            settings.thread_limit = limit;
        }
    }
}

pub fn run_config_show(path: &Path, settings: &Settings) -> Result<()> {
    println!("config file:         {}", path.display());
    println!("operating folder:    {}", settings.operating_folder.display());
    println!("file name scheme:    {}", settings.file_name_scheme);
    println!("skip existing files: {}", settings.skip_existing_files);
    println!("thread limit:        {}", settings.thread_limit);
    println!(
        "retry:               {} attempts, {}s base delay, {}s max delay",
        settings.retry.max_attempts, settings.retry.base_delay_secs, settings.retry.max_delay_secs
    );
    println!(
        "scan:                {} per page, poll every {}s, live tail {}",
        settings.scan.page_size, settings.scan.poll_interval_secs, settings.scan.live_tail
    );
    Ok(())
}

pub fn run_config_set(path: &Path, mut settings: Settings, changes: ConfigChanges) -> Result<()> {
    if changes.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }
    changes.apply(&mut settings);
    settings.validate()?;
    config::store_to(path, &settings)
        .with_context(|| format!("store settings to {}", path.display()))?;
    println!("Settings saved to {}", path.display());
    Ok(())
}
