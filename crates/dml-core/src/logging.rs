//! Tracing setup for the `dml` binary.
//!
//! Logs go to `$XDG_STATE_HOME/dml/dml.log`. When that file cannot be opened
//! they go to stderr instead. `RUST_LOG` overrides the default filter.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,dml=debug,dml_core=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file() -> Result<(PathBuf, File)> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dml")?;
    let dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("dml.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    Ok((path, file))
}

/// Install a subscriber writing to the log file. Errors leave no subscriber installed.
pub fn init_logging() -> Result<PathBuf> {
    let (path, file) = open_log_file()?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;
    tracing::info!(path = %path.display(), "logging initialized");
    Ok(path)
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// File logging, falling back to stderr.
pub fn init() -> LogSink {
    match init_logging() {
        Ok(path) => LogSink::File(path),
        Err(err) => {
            init_logging_stderr();
            tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
            LogSink::Stderr
        }
    }
}
