//! Process-wide settings: operating folder, file name scheme, skip policy and thread limit.
//!
//! Persisted as TOML under `~/.config/dml/config.toml`. Loading and storing are explicit
//! calls; nothing here writes to disk as a side effect of changing a field.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::naming::FileNameScheme;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// How channel history is walked (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Messages requested per history page.
    pub page_size: u32,
    /// Seconds between polls for new messages once backfill is done.
    pub poll_interval_secs: u64,
    /// Keep watching the channel after backfill. When false a run ends at the end of history.
    pub live_tail: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            poll_interval_secs: 30,
            live_tail: true,
        }
    }
}

/// Global settings loaded from `~/.config/dml/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root folder; every downloaded file lands somewhere below it.
    pub operating_folder: PathBuf,
    /// Template for the path of each attachment relative to the operating folder.
    pub file_name_scheme: String,
    /// Skip attachments whose destination already exists and is non-empty.
    pub skip_existing_files: bool,
    /// Maximum number of jobs scanning at the same time.
    pub thread_limit: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operating_folder: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            file_name_scheme: FileNameScheme::DEFAULT.to_string(),
            skip_existing_files: true,
            thread_limit: 2,
            retry: RetryConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Settings {
    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.thread_limit == 0 {
            anyhow::bail!("thread_limit must be at least 1");
        }
        if self.scan.page_size == 0 {
            anyhow::bail!("scan.page_size must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        FileNameScheme::parse(&self.file_name_scheme)
            .with_context(|| format!("invalid file_name_scheme {:?}", self.file_name_scheme))?;
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dml")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from the default location, creating a default file if none exists.
pub fn load_or_init() -> Result<Settings> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = Settings::default();
        store_to(&path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate settings from `path`.
pub fn load_from(path: &Path) -> Result<Settings> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: Settings =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Store settings to `path`, replacing the file atomically.
pub fn store_to(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let toml = toml::to_string_pretty(settings)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, toml.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}
