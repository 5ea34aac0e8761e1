//! Classify HTTP status, curl errors and platform errors into retry kinds.

use super::policy::ErrorKind;
use crate::platform::{FetchError, PlatformError};

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

pub fn classify_fetch_error(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::PartialTransfer { .. } => ErrorKind::Connection,
        FetchError::Storage(_) | FetchError::Aborted => ErrorKind::Other,
    }
}

pub fn classify_platform_error(e: &PlatformError) -> ErrorKind {
    match e {
        PlatformError::Http(code) => classify_http_status(*code),
        PlatformError::Transport(_) => ErrorKind::Connection,
        PlatformError::Unauthorized | PlatformError::Forbidden(_) | PlatformError::NotFound(_) => {
            ErrorKind::Other
        }
    }
}
