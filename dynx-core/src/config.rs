use crate::retry::RetryPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest number of keys the store accepts in one batch get call
pub const MAX_BATCH_GET_SIZE: usize = 100;

/// Batch fetch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum keys per bucket (1..=100)
    pub max_batch_size: usize,

    /// Maximum buckets in flight at once (None = all buckets at once)
    pub max_concurrency: Option<usize>,

    /// Policy for retryable transport errors
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_GET_SIZE,
            max_concurrency: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum keys per bucket
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Limit how many buckets are fetched concurrently
    pub fn with_max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = Some(concurrency);
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_GET_SIZE {
            return Err(Error::InvalidArgument(format!(
                "max_batch_size must be between 1 and {}",
                MAX_BATCH_GET_SIZE
            )));
        }

        if self.max_concurrency == Some(0) {
            return Err(Error::InvalidArgument(
                "max_concurrency must be greater than 0 when set".to_string(),
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::InvalidArgument(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        Ok(())
    }
}
