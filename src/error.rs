//! Error types used by the taskgate runtime, its units of work and its lock.
//!
//! This module defines three error enums:
//!
//! - [`TaskError`] — failures of individual units of work and wrapped operations.
//! - [`RuntimeError`] — misconfiguration and shutdown failures of the core itself.
//! - [`LockError`] — misuse of a [`ReentrantLock`](crate::ReentrantLock).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by the taskgate runtime.
///
/// These represent failures of the core itself: configuration rejected at the
/// call site, or a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Programmer-supplied configuration is invalid (zero attempts, zero capacity, ...).
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was rejected and why.
        reason: String,
    },

    /// Shutdown grace period was exceeded; some units did not reach a terminal state.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Labels of the units that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RuntimeError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::InvalidConfig { reason } => format!("invalid config: {reason}"),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck units={stuck:?}")
            }
        }
    }
}

/// Classification of [`TaskError`] variants.
///
/// Used by [`RetryPolicy`](crate::RetryPolicy) to decide which failures trigger a retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskErrorKind {
    /// See [`TaskError::Timeout`].
    Timeout,
    /// See [`TaskError::Fatal`].
    Fatal,
    /// See [`TaskError::Fail`].
    Fail,
    /// See [`TaskError::Canceled`].
    Canceled,
    /// See [`TaskError::Panicked`].
    Panicked,
}

/// # Errors produced by units of work and wrapped operations.
///
/// Some errors are retryable by default (`Timeout`, `Fail`), others are considered final.
/// `Canceled` is an expected outcome of a deliberate cancellation request and is never
/// logged as an error.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Operation did not complete before its deadline and was cancelled.
    #[error("{task} timed out after {timeout:?}")]
    Timeout {
        /// Name of the operation that timed out.
        task: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (should not be retried).
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Execution failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// Unit of work was cancelled before it finished.
    #[error("context cancelled")]
    Canceled,

    /// Unit of work (or one of its callbacks) panicked.
    #[error("panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(reason: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(reason: impl std::fmt::Display) -> Self {
        TaskError::Fatal {
            reason: reason.to_string(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            TaskError::Timeout { .. } => TaskErrorKind::Timeout,
            TaskError::Fatal { .. } => TaskErrorKind::Fatal,
            TaskError::Fail { .. } => TaskErrorKind::Fail,
            TaskError::Canceled => TaskErrorKind::Canceled,
            TaskError::Panicked { .. } => TaskErrorKind::Panicked,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { task: "fetch".into(), timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { task, timeout } => format!("timeout: {task} after {timeout:?}"),
            TaskError::Fatal { reason } => format!("fatal: {reason}"),
            TaskError::Fail { reason } => format!("error: {reason}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Panicked { reason } => format!("panic: {reason}"),
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`TaskError::Fail`] and [`TaskError::Timeout`],
    /// `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::Timeout { .. })
    }

    /// Returns `true` for [`TaskError::Canceled`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Renders a panic payload caught with `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let reason = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked { reason }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::fail(err)
    }
}

/// # Misuse of a reentrant lock.
///
/// Lock misuse is a programming defect: it is always returned to the caller,
/// never swallowed, and never changes the lock state.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// `release` was called by a unit that does not hold the lock.
    #[error("lock release by {caller} but owner is {owner:?}")]
    NotOwner {
        /// The unit that attempted the release.
        caller: TaskId,
        /// The current owner, if any.
        owner: Option<TaskId>,
    },

    /// No task identity is installed for the current call chain.
    #[error("no task identity in scope; run inside a unit spawned by taskgate or TaskId::scope")]
    NoTaskIdentity,
}

impl LockError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LockError::NotOwner { .. } => "lock_not_owner",
            LockError::NoTaskIdentity => "lock_no_task_identity",
        }
    }
}
