//! Retry loops: run an operation until success, a permanent error, or the policy says stop.
//!
//! Backoff sleeps are abort-aware so a stopped job does not sit out its delay.

use std::future::Future;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::AbortToken;

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum Retried<E> {
    /// Last error, after `attempts` tries. `transient` is false for errors that were never retryable.
    Failed { error: E, attempts: u32, transient: bool },
    /// Abort was requested while backing off.
    Aborted,
}

fn give_up<E>(error: E, attempts: u32, kind: ErrorKind) -> Retried<E> {
    Retried::Failed {
        error,
        attempts,
        transient: kind.is_transient(),
    }
}

/// Blocking retry loop for code running on a blocking thread.
pub fn run_with_retry<T, E, F, C>(
    policy: &RetryPolicy,
    abort: &AbortToken,
    classify: C,
    mut f: F,
) -> Result<T, Retried<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    C: Fn(&E) -> ErrorKind,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(give_up(e, attempt, kind)),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                        if !abort.sleep_blocking(d) {
                            return Err(Retried::Aborted);
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// Async retry loop; backoff uses tokio timers raced against the abort token.
pub async fn retry_async<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    abort: &AbortToken,
    classify: C,
    mut f: F,
) -> Result<T, Retried<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorKind,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        let result = tokio::select! {
            r = f() => r,
            _ = abort.cancelled() => return Err(Retried::Aborted),
        };
        match result {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(give_up(e, attempt, kind)),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                        if !abort.sleep(d).await {
                            return Err(Retried::Aborted);
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
