use crate::error::AppError;

/// Retry decision for a single target's fetch.
///
/// Only throttling signals are retried. Any other failure resolves the
/// target to "no reference" straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// `attempt` is zero-based: the first request is attempt 0.
    pub fn should_retry(&self, error: &AppError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }

    /// Upper bound on requests issued for one target.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
