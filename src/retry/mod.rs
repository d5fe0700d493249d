//! Retry policy for failed item attempts.
//!
//! Decides whether a failed attempt is retried and how long to wait first.
//! Backoff is linear in the retry number.

use std::time::Duration;

use crate::executor::ExecutionError;

/// Default cap on retries per item (attempts = retries + 1)
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default backoff unit
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of a retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made
    pub retry: bool,
    /// How long to wait before that attempt (zero when not retrying)
    pub delay: Duration,
}

impl RetryDecision {
    pub fn retry_after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }

    pub fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Decide what to do after a failed attempt.
    ///
    /// `attempt_count` is the number of retries already performed for the
    /// item. Terminal errors never retry and never consume a retry slot.
    pub fn should_retry(&self, attempt_count: u32, error: &ExecutionError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::give_up();
        }
        if attempt_count >= self.max_retries {
            return RetryDecision::give_up();
        }
        RetryDecision::retry_after(self.backoff(attempt_count + 1))
    }

    /// Delay before the 1-based `retry_number`-th retry
    pub fn backoff(&self, retry_number: u32) -> Duration {
        self.base_delay.saturating_mul(retry_number)
    }

    /// Total attempts an item may receive
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sum of all backoff delays for an item that exhausts its retries
    pub fn worst_case_backoff(&self) -> Duration {
        (1..=self.max_retries).fold(Duration::ZERO, |acc, n| acc.saturating_add(self.backoff(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> ExecutionError {
        ExecutionError::Transient("activation endpoint returned 502".into())
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
    }

    #[test]
    fn test_retries_until_cap() {
        let policy = RetryPolicy::default();

        let first = policy.should_retry(0, &transient());
        assert_eq!(first, RetryDecision::retry_after(Duration::from_secs(1)));

        let second = policy.should_retry(1, &transient());
        assert_eq!(second, RetryDecision::retry_after(Duration::from_secs(2)));

        let third = policy.should_retry(2, &transient());
        assert_eq!(third, RetryDecision::give_up());
    }

    #[test]
    fn test_timeouts_are_retried() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(0, &ExecutionError::Timeout(Duration::from_secs(15)));
        assert!(decision.retry);
    }

    #[test]
    fn test_terminal_errors_never_retry() {
        let policy = RetryPolicy::new(10, Duration::from_millis(5));
        let decision = policy.should_retry(0, &ExecutionError::Terminal("invalid barcode".into()));
        assert!(!decision.retry);
        assert_eq!(decision.delay, Duration::ZERO);
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert!(!policy.should_retry(0, &transient()).retry);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.worst_case_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_worst_case_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        // 100 + 200 + 300
        assert_eq!(policy.worst_case_backoff(), Duration::from_millis(600));
    }

    #[test]
    fn test_decision_is_pure() {
        let policy = RetryPolicy::default();
        let a = policy.should_retry(1, &transient());
        let b = policy.should_retry(1, &transient());
        assert_eq!(a, b);
    }
}
