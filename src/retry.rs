//! Retry classification and backoff for transfer attempts
//!
//! Failed jobs are retried by re-enqueueing them on the pipeline's shared
//! queue (any free worker may serve the next attempt), so there is no inline
//! retry loop here. This module supplies the two pieces the pipeline needs:
//! classification of an attempt's error as transient or permanent, and the
//! capped exponential backoff delay applied before a job goes back on the
//! queue.

use crate::config::RetryConfig;
use crate::error::TransferError;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, interrupted writes)
/// should return `true`. Permanent failures (missing resource, rejected
/// auth) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the attempt should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connect failures, timeouts, and interrupted body streams are
            // the classic transient cases
            TransferError::Request(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
            }
            // Server-side trouble and explicit back-pressure retry; other
            // client errors (404, 403, ...) will not get better on their own
            TransferError::Status { code, .. } => {
                matches!(code, 408 | 429) || (500..=599).contains(code)
            }
            // Collision/filesystem errors count as transfer errors and retry
            // the same way; another worker may release the contended path
            TransferError::Io(_) => true,
            // 10_000 occupied candidate names will not clear up between attempts
            TransferError::NoUniqueName { .. } => false,
        }
    }
}

/// Backoff delay before re-enqueueing attempt number `attempt + 1`
///
/// `attempt` is the number of attempts already performed (>= 1 when called).
/// The first re-enqueue waits `initial_delay`; each further one multiplies by
/// `backoff_multiplier`, capped at `max_delay`, with optional jitter on top.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = config.backoff_multiplier.powi(exponent as i32);
    let raw = Duration::from_secs_f64(config.initial_delay.as_secs_f64() * factor);
    let capped = raw.min(config.max_delay);

    if config.jitter { add_jitter(capped) } else { capped }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
