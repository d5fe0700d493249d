//! Engine configuration for one batch run.

use std::time::Duration;

use crate::progress::DEFAULT_ITEM_ESTIMATE;
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, RetryPolicy};

/// Configuration for the BatchOrchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Retries allowed per item after its first attempt
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `base_delay * n`
    pub base_delay: Duration,
    /// Deadline for a single attempt
    pub per_item_timeout: Duration,
    /// Pause between consecutive items, regardless of outcome
    pub inter_item_delay: Duration,
    /// ETA per item before any item has finished
    pub default_item_estimate: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            per_item_timeout: Duration::from_secs(15),
            inter_item_delay: Duration::from_millis(200),
            default_item_estimate: DEFAULT_ITEM_ESTIMATE,
        }
    }
}

impl RunConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = timeout;
        self
    }

    pub fn with_inter_item_delay(mut self, delay: Duration) -> Self {
        self.inter_item_delay = delay;
        self
    }

    pub fn with_default_item_estimate(mut self, estimate: Duration) -> Self {
        self.default_item_estimate = estimate;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay)
    }
}
