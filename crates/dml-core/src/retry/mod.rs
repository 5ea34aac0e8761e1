//! Retry and backoff policy.
//!
//! Classifies fetch and platform failures (timeouts, throttling, connection
//! errors, 5xx) and decides exponential backoff, shared by the downloader
//! (per attachment) and the scanner (per history page).

mod classify;
mod policy;
mod run;

pub use classify::{classify_fetch_error, classify_http_status, classify_platform_error};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{retry_async, run_with_retry, Retried};
