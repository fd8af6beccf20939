//! # Unit of work lifecycle.
//!
//! A [`Unit`] is the spawned side of a [`TaskHandle`]: it owns the state sender and
//! drives the transitions every component shares.
//!
//! ```text
//! Unit::new ──► Pending
//!                 │ mark_running()          (pool: after admission; registry: immediately)
//!                 ▼
//!              Running ── execute(work) ──► select {
//!                                             token.cancelled() → Err(Canceled)
//!                                             work (scoped id, catch_unwind) → Ok / Err / Panicked
//!                                           }
//!                 │ finish(&res)
//!                 ▼
//!        Completed | Failed | Cancelled
//! ```
//!
//! ## Rules
//! - `work` runs with the unit's [`TaskId`] installed as the current task identity.
//! - Panics are captured and become [`TaskError::Panicked`]; they never escape the unit.
//! - `finish` consumes the unit, so the terminal transition happens exactly once.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{TaskHandle, TaskId, TaskState};

/// Spawned side of a unit of work.
pub(crate) struct Unit {
    id: TaskId,
    name: Option<Arc<str>>,
    token: CancellationToken,
    state: watch::Sender<TaskState>,
}

impl Unit {
    /// Creates a pending unit and its observer handle.
    pub(crate) fn new(name: Option<Arc<str>>, token: CancellationToken) -> (Self, TaskHandle) {
        let id = TaskId::next();
        let (tx, rx) = watch::channel(TaskState::Pending);
        let handle = TaskHandle::new(id, name.clone(), token.clone(), rx);
        (
            Self {
                id,
                name,
                token,
                state: tx,
            },
            handle,
        )
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => self.id.to_string(),
        }
    }

    /// Pending → Running (no-op in any other state).
    pub(crate) fn mark_running(&self) {
        self.state.send_if_modified(|s| {
            if *s == TaskState::Pending {
                *s = TaskState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Runs `work` until it finishes or the unit is cancelled.
    pub(crate) async fn execute<T, F>(&self, work: F) -> Result<T, TaskError>
    where
        F: Future<Output = Result<T, TaskError>>,
    {
        self.mark_running();
        let guarded = self.id.scope(AssertUnwindSafe(work).catch_unwind());

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Canceled),
            res = guarded => match res {
                Ok(res) => res,
                Err(panic) => Err(TaskError::from_panic(panic)),
            },
        }
    }

    /// Publishes the terminal state matching `res`.
    pub(crate) fn finish<T>(self, res: &Result<T, TaskError>) {
        self.state.send_replace(TaskState::from_outcome(res));
    }
}
