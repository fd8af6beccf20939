use std::fmt;

use crate::error::TaskError;

/// Lifecycle state of a unit of work.
///
/// ```text
/// Pending ──admission──► Running ──► Completed
///    │                      ├──────► Failed
///    └──────────────────────┴──────► Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, waiting for admission.
    Pending,
    /// Admitted and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure (including panics and timeouts).
    Failed,
    /// Finished because cancellation was requested.
    Cancelled,
}

impl TaskState {
    /// Returns `true` for `Completed`, `Failed` and `Cancelled`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Terminal state matching the outcome of a unit.
    pub(crate) fn from_outcome<T>(res: &Result<T, TaskError>) -> Self {
        match res {
            Ok(_) => TaskState::Completed,
            Err(TaskError::Canceled) => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
