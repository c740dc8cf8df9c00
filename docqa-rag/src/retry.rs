//! Timeout and retry for calls to external capabilities.
//!
//! Every embedding, vector index, and generation call goes through
//! [`with_retry`]. A call that exceeds its timeout counts as a transient
//! failure. Transient failures are retried with exponential backoff
//! (`initial_backoff_ms`, doubling, capped at `max_backoff_ms`) until
//! `max_attempts` is reached; anything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{RagError, Result};

/// Run `call` with a per-attempt `timeout`, retrying transient failures.
///
/// `on_timeout` builds the error reported when an attempt times out; it
/// should be retriable so the attempt is repeated.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    timeout: Duration,
    operation: &str,
    on_timeout: impl Fn(Duration) -> RagError,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let delay = policy.backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(on_timeout(timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retriable() && attempt < max_attempts => {
                warn!(operation, attempt, max_attempts, error = %e, "transient failure, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
