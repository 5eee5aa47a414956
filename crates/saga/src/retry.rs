//! Failure classification and bounded retries for remote steps.
//!
//! Every adapter classifies failures before they reach the coordinator:
//! the coordinator only ever sees "retry me" (transient) or "fail the
//! saga, possibly after compensating" (everything else).

use std::future::Future;
use std::time::Duration;

use domain::ProductId;
use thiserror::Error;

/// A classified failure from a remote step adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    /// Timeout, 5xx, connection loss — worth retrying with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The ledger could not cover the batch. Non-retryable: the saga
    /// fails immediately, and since nothing was debited there is nothing
    /// to compensate.
    #[error("insufficient stock for {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// The payment was declined. Non-retryable: the saga fails after
    /// releasing the reservation.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// Malformed request — rejected without retry or state change.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl StepError {
    /// Returns true if the failure is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Transient(_))
    }
}

/// Bounded retry policy with a fixed backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy with no waiting, for tests.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Three attempts, five seconds apart.
        Self::new(3, Duration::from_secs(5))
    }
}

/// Runs an operation until it succeeds, fails non-retryably, or the
/// attempts run out.
pub async fn run_with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    step: &'static str,
    mut op: F,
) -> Result<T, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(step, attempt, %error, "step failed, retrying");
                metrics::counter!("saga_step_retries").increment(1);
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
