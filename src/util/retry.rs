//! Fixed-backoff retry policy.

use std::time::Duration;

use crate::error::AgentError;

/// Retry policy applied to LLM requests.
///
/// Only errors whose code is retryable (network failures, rate limiting) are
/// retried; everything else propagates on the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether `attempt` (1-based) failing with `error` earns another attempt.
    pub fn should_retry(&self, error: &AgentError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn retries_only_retryable_codes_within_budget() {
        let policy = RetryPolicy::default();
        let network = AgentError::llm_service(ErrorCode::NetworkError, "reset");
        let api = AgentError::llm_service(ErrorCode::LlmApiError, "bad request");

        assert!(policy.should_retry(&network, 1));
        assert!(policy.should_retry(&network, 2));
        assert!(!policy.should_retry(&network, 3));
        assert!(!policy.should_retry(&api, 1));
    }

    #[test]
    fn none_never_retries() {
        let err = AgentError::from_status(429, "");
        assert!(!RetryPolicy::none().should_retry(&err, 1));
    }
}
