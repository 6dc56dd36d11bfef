//! Bulk execution configuration.

use std::time::Duration;

/// Default number of documents per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default number of batches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default attempt cap for a single document mutation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between retry attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Tuning knobs for a bulk run.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Documents per batch.
    pub batch_size: usize,
    /// Batches allowed in flight at once.
    pub max_concurrency: usize,
    /// Attempt cap per document mutation.
    pub max_attempts: u32,
    /// Pause between retry attempts.
    pub retry_backoff: Duration,
}

impl BulkConfig {
    /// Create a configuration with the default knobs.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the concurrency cap.
    pub fn with_max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = concurrency;
        self
    }

    /// Set the attempt cap.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BulkConfig::default();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.retry_backoff, DEFAULT_RETRY_BACKOFF);
    }

    #[test]
    fn test_config_builder() {
        let config = BulkConfig::new()
            .with_batch_size(10)
            .with_max_concurrency(2)
            .with_max_attempts(5)
            .with_retry_backoff(Duration::from_millis(5));

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(5));
    }
}
