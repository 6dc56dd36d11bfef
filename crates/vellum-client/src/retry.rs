//! Retry policy for single store operations.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::transport::StoreError;

/// A failure that survived every permitted attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    /// The last failure observed.
    pub error: StoreError,
    /// The attempt number reached before giving up.
    pub attempts: u32,
}

/// Retries an operation on retriable failure, bounded by an attempt cap.
///
/// Only failures classified retriable by [`StoreError::is_retriable`]
/// are retried; terminal failures surface immediately, tagged with the
/// attempt count reached.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy with an attempt cap and a fixed backoff between
    /// attempts.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            // Zero attempts would never run the operation.
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run an operation under this policy.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retriable() && attempt < self.max_attempts => {
                    debug!(attempt, error = %error, "retrying transient store failure");
                    tokio::time::sleep(self.backoff).await;
                }
                Err(error) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF)
    }
}
