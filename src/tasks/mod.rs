//! # Units of work and suspendable operations.
//!
//! This module provides the task-related types:
//! - [`TaskId`] - logical task identity (task-local, never thread-based)
//! - [`TaskState`] - lifecycle state of a unit of work
//! - [`TaskHandle`] / [`TaskJoin`] - observer and owning handles to spawned units
//! - [`Operation`] - trait for named, cancelable, repeatable async operations
//! - [`OperationFn`] - function-backed operation implementation

mod handle;
mod id;
mod operation;
mod operation_fn;
mod state;
pub(crate) mod unit;

pub use handle::{TaskHandle, TaskJoin};
pub(crate) use handle::join_unit;
pub use id::TaskId;
pub use operation::Operation;
pub use operation_fn::OperationFn;
pub use state::TaskState;
