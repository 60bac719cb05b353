use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retrying retryable transport failures.
///
/// `max_attempts` counts retries, not the initial attempt. `None` retries for
/// as long as the store keeps answering with retryable errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_attempts: Option<u32>,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier applied to backoff after each retry
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Creates a capped retry policy with exponential backoff.
    pub fn new(
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_backoff_ms,
            max_backoff_ms,
            backoff_multiplier,
        }
    }

    /// Re-issues immediately, without limit.
    pub fn immediate() -> Self {
        Self {
            max_attempts: None,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Returns a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(0),
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Returns a policy optimized for quick transient failures.
    pub fn fast() -> Self {
        Self::new(3, 10, 100, 2.0)
    }

    /// Returns a policy for throttled production tables.
    pub fn standard() -> Self {
        Self::new(5, 100, 5000, 2.0)
    }

    /// Calculates the backoff duration for a given attempt number (0-indexed).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let backoff_ms = (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_backoff_ms as f64) as u64;
        Duration::from_millis(backoff_ms)
    }

    /// True if another retry is allowed after `retries` retries have been made.
    pub fn allows(&self, retries: u32) -> bool {
        self.max_attempts.map_or(true, |max| retries < max)
    }
}

impl Default for RetryPolicy {
    /// Same as `immediate()`.
    fn default() -> Self {
        Self::immediate()
    }
}

/// Runs `operation` until it succeeds, fails with a terminal error, or the
/// policy runs out of retries.
///
/// When a capped policy gives up, the last retryable error is returned inside
/// [`Error::RetriesExhausted`].
///
/// # Examples
///
/// ```no_run
/// use dynx_core::retry::{retry_with_policy, RetryPolicy};
/// use dynx_core::Result;
///
/// async fn flaky_call() -> Result<u32> {
///     Ok(7)
/// }
///
/// # async fn run() -> Result<()> {
/// let n = retry_with_policy(&RetryPolicy::fast(), || flaky_call()).await?;
/// # let _ = n;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_policy<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0u32;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if !policy.allows(retries) {
                    return Err(Error::RetriesExhausted {
                        attempts: retries + 1,
                        last: Box::new(e),
                    });
                }

                let backoff = policy.backoff_duration(retries);
                warn!(
                    error = %e,
                    retry = retries + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "retryable error, re-issuing request"
                );
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                retries += 1;
            }
        }
    }
}
