//! Fetch attachment bytes by URL.
//!
//! `Fetcher` is blocking: the downloader always calls it from `spawn_blocking`.

use crate::control::JobAborted;
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Error returned by a single fetch attempt. Kept concrete so the retry layer can
/// classify it before it is reported.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Transfer completed but the byte count differs from the size the platform reported.
    PartialTransfer { expected: u64, received: u64 },
    /// Writing to the staged file failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// The job was stopped while bytes were in flight.
    Aborted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            FetchError::Http(_) | FetchError::PartialTransfer { .. } | FetchError::Aborted => None,
        }
    }
}

/// Streams the body at `url` into `sink`, returning the number of bytes written.
///
/// A write error from `sink` must abort the transfer and be returned as
/// `FetchError::Storage`, or `FetchError::Aborted` when the sink's error wraps `JobAborted`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

/// Fetcher backed by libcurl's easy interface.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    pub connect_timeout: Duration,
    /// Abort when throughput stays under 1 KiB/s for this long.
    pub low_speed_time: Duration,
    pub user_agent: String,
}

impl Default for CurlFetcher {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
            user_agent: concat!("dml/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let mut written = 0u64;
        let mut write_err: Option<std::io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(FetchError::Curl)?;
        easy.follow_location(true).map_err(FetchError::Curl)?;
        easy.max_redirections(10).map_err(FetchError::Curl)?;
        easy.useragent(&self.user_agent).map_err(FetchError::Curl)?;
        easy.connect_timeout(self.connect_timeout).map_err(FetchError::Curl)?;
        easy.low_speed_limit(1024).map_err(FetchError::Curl)?;
        easy.low_speed_time(self.low_speed_time).map_err(FetchError::Curl)?;
        // 4xx/5xx bodies never reach the sink.
        easy.fail_on_error(true).map_err(FetchError::Curl)?;

        let perform = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match sink.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        write_err = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(FetchError::Curl)?;
            transfer.perform()
        };

        if let Some(e) = write_err {
            if e.get_ref().is_some_and(|inner| inner.is::<JobAborted>()) {
                return Err(FetchError::Aborted);
            }
            return Err(FetchError::Storage(e));
        }
        let code = easy.response_code().map_err(FetchError::Curl)?;
        if let Err(e) = perform {
            if e.is_http_returned_error() && code >= 400 {
                return Err(FetchError::Http(code));
            }
            return Err(FetchError::Curl(e));
        }
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        Ok(written)
    }
}
