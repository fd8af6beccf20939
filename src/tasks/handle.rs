//! # Handles to units of work.
//!
//! - [`TaskHandle`] is a cheap, cloneable observer: identity, name, live state and
//!   a cancellation switch. Bookkeeping collections hold these.
//! - [`TaskJoin`] additionally owns the join handle and yields the unit's result.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{TaskId, TaskState};

/// Observer handle to one unit of work.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: TaskId,
    name: Option<Arc<str>>,
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        name: Option<Arc<str>>,
        cancel: CancellationToken,
        state: watch::Receiver<TaskState>,
    ) -> Self {
        Self {
            id,
            name,
            cancel,
            state,
        }
    }

    /// Unique identity of the unit.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Optional human-readable name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name if set, otherwise the identity (`task-N`).
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => self.id.to_string(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Returns `true` once the unit reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Requests cooperative cancellation.
    ///
    /// Takes effect at the unit's next suspension point. Idempotent; a no-op for
    /// units that already finished.
    pub fn cancel(&self) {
        if !self.is_terminal() {
            self.cancel.cancel();
        }
    }

    /// Returns `true` if cancellation was requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until the unit reaches a terminal state.
    ///
    /// Also returns if the unit was dropped by the runtime without ever finishing.
    pub async fn terminated(&self) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(TaskState::is_terminal).await;
    }
}

/// Owning handle to a spawned unit of work.
#[derive(Debug)]
pub struct TaskJoin<T> {
    handle: TaskHandle,
    join: JoinHandle<Result<T, TaskError>>,
}

impl<T> TaskJoin<T> {
    pub(crate) fn new(handle: TaskHandle, join: JoinHandle<Result<T, TaskError>>) -> Self {
        Self { handle, join }
    }

    /// Observer handle (clone it to keep watching after `join`).
    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    /// Unique identity of the unit.
    pub fn id(&self) -> TaskId {
        self.handle.id()
    }

    /// Requests cooperative cancellation (see [`TaskHandle::cancel`]).
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Waits for the unit and returns its result or failure.
    pub async fn join(self) -> Result<T, TaskError> {
        join_unit(self.join).await
    }

    pub(crate) fn into_parts(self) -> (TaskHandle, JoinHandle<Result<T, TaskError>>) {
        (self.handle, self.join)
    }
}

/// Awaits a spawned unit, folding join failures into [`TaskError`].
pub(crate) async fn join_unit<T>(join: JoinHandle<Result<T, TaskError>>) -> Result<T, TaskError> {
    match join.await {
        Ok(res) => res,
        Err(je) if je.is_cancelled() => Err(TaskError::Canceled),
        Err(je) => Err(TaskError::from_panic(je.into_panic())),
    }
}
