//! # Retry policy.
//!
//! [`RetryPolicy`] bundles how many times an operation may be attempted, how long to
//! wait between attempts ([`BackoffPolicy`]) and which failure kinds are worth
//! retrying. Other kinds propagate immediately without consuming an attempt.
//!
//! ```rust
//! use std::time::Duration;
//! use taskgate::{RetryPolicy, TaskError, TaskErrorKind};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(200), 2.0)?
//!     .retry_on([TaskErrorKind::Fail]);
//!
//! assert!(policy.should_retry(&TaskError::fail("503")));
//! assert!(!policy.should_retry(&TaskError::Timeout { task: "x".into(), timeout: Duration::from_secs(1) }));
//! assert_eq!(policy.delay_after(2), Duration::from_millis(400));
//! # Ok::<(), taskgate::RuntimeError>(())
//! ```

use std::time::Duration;

use crate::error::{RuntimeError, TaskError, TaskErrorKind};
use crate::policies::{BackoffPolicy, JitterPolicy};

/// Kinds retried by default.
const DEFAULT_RETRY_ON: [TaskErrorKind; 2] = [TaskErrorKind::Fail, TaskErrorKind::Timeout];

/// Attempts, backoff and retryable failure kinds.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: BackoffPolicy,
    retry_on: Vec<TaskErrorKind>,
}

impl Default for RetryPolicy {
    /// 3 attempts, 1s initial delay doubling each time, retry on `Fail` and `Timeout`.
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffPolicy::default(),
            retry_on: DEFAULT_RETRY_ON.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with exponential backoff.
    ///
    /// Fails with [`RuntimeError::InvalidConfig`] if `attempts == 0` or `multiplier`
    /// is below `1.0` or not finite.
    pub fn new(attempts: u32, initial_delay: Duration, multiplier: f64) -> Result<Self, RuntimeError> {
        Self::with_backoff(attempts, BackoffPolicy::exponential(initial_delay, multiplier))
    }

    /// Creates a policy from a fully specified [`BackoffPolicy`].
    pub fn with_backoff(attempts: u32, backoff: BackoffPolicy) -> Result<Self, RuntimeError> {
        if attempts == 0 {
            return Err(RuntimeError::invalid("retry attempts must be >= 1"));
        }
        backoff.validate()?;
        Ok(Self {
            attempts,
            backoff,
            retry_on: DEFAULT_RETRY_ON.to_vec(),
        })
    }

    /// A single attempt: failures propagate immediately, no delay.
    pub fn passthrough() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Replaces the set of failure kinds that trigger a retry.
    ///
    /// `Canceled` and `Panicked` are ignored: cancellation is never retried and a
    /// panic is a bug, not a transient failure.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = TaskErrorKind>) -> Self {
        self.retry_on = kinds
            .into_iter()
            .filter(|k| !matches!(k, TaskErrorKind::Canceled | TaskErrorKind::Panicked))
            .collect();
        self
    }

    /// Caps every single delay at `max`.
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.backoff.max = max;
        self
    }

    /// Sets the jitter applied to computed delays.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.backoff.jitter = jitter;
        self
    }

    /// Maximum number of attempts (always `>= 1`).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff configuration.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Returns `true` if `err` is of a kind this policy retries.
    pub fn should_retry(&self, err: &TaskError) -> bool {
        self.retry_on.contains(&err.kind())
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay_after(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_attempts_is_rejected() {
        let err = RetryPolicy::new(0, Duration::from_millis(10), 2.0).unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        assert!(RetryPolicy::new(3, Duration::from_millis(10), 0.9).is_err());
    }

    #[test]
    fn defaults_retry_transient_kinds_only() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts(), 3);
        assert!(p.should_retry(&TaskError::fail("reset")));
        assert!(!p.should_retry(&TaskError::fatal("unauthorized")));
        assert!(!p.should_retry(&TaskError::Canceled));
    }

    #[test]
    fn cancellation_is_never_retryable() {
        let p = RetryPolicy::default().retry_on([
            TaskErrorKind::Fatal,
            TaskErrorKind::Canceled,
            TaskErrorKind::Panicked,
        ]);
        assert!(p.should_retry(&TaskError::fatal("flaky auth")));
        assert!(!p.should_retry(&TaskError::Canceled));
        assert!(!p.should_retry(&TaskError::fail("reset")));
    }

    #[test]
    fn passthrough_has_one_attempt() {
        assert_eq!(RetryPolicy::passthrough().attempts(), 1);
    }
}
