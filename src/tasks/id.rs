//! # Logical task identity.
//!
//! [`TaskId`] identifies one unit of work. It is the owner token used by
//! [`ReentrantLock`](crate::ReentrantLock): many units share one OS thread under
//! tokio, so ownership is never derived from the thread.
//!
//! Every unit spawned by taskgate runs inside [`TaskId::scope`], which installs the
//! id in tokio task-local storage. Code running outside the core can install its own
//! identity the same way:
//!
//! ```rust
//! use taskgate::TaskId;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let id = TaskId::next();
//! let seen = id.scope(async { TaskId::current() }).await;
//! assert_eq!(seen, Some(id));
//! assert_eq!(TaskId::current(), None);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global counter for unit identities.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_TASK: TaskId;
}

/// Unique identity of a unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates a fresh, process-unique identity.
    pub fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Returns the identity installed for the current call chain, if any.
    pub fn current() -> Option<Self> {
        CURRENT_TASK.try_with(|id| *id).ok()
    }

    /// Runs `fut` with this identity installed as the current task.
    pub fn scope<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        CURRENT_TASK.scope(self, fut)
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
