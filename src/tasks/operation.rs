//! # Suspendable operations.
//!
//! [`Operation`] is the seam decorators plug into: a named async computation that
//! receives a [`CancellationToken`] and can be invoked repeatedly (each call produces
//! a fresh attempt). [`Retry`](crate::Retry) and [`TimeoutGuard`](crate::TimeoutGuard)
//! wrap an operation and are operations themselves, so they compose.
//!
//! # Example
//! ```
//! use tokio_util::sync::CancellationToken;
//! use async_trait::async_trait;
//! use taskgate::{Operation, TaskError};
//!
//! struct ListLibraries;
//!
//! #[async_trait]
//! impl Operation for ListLibraries {
//!     type Output = Vec<String>;
//!
//!     fn name(&self) -> &str { "list_libraries" }
//!
//!     async fn call(&self, ctx: CancellationToken) -> Result<Vec<String>, TaskError> {
//!         if ctx.is_cancelled() {
//!             return Err(TaskError::Canceled);
//!         }
//!         Ok(vec!["Movies".into(), "Music".into()])
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// # Asynchronous, cancelable, repeatable operation.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Success value.
    type Output: Send + 'static;

    /// Returns a stable, human-readable operation name.
    fn name(&self) -> &str;

    /// Performs one invocation.
    ///
    /// Implementations should check `ctx.is_cancelled()` (or await `ctx.cancelled()`)
    /// and return [`TaskError::Canceled`] promptly.
    async fn call(&self, ctx: CancellationToken) -> Result<Self::Output, TaskError>;
}

#[async_trait]
impl<O: Operation + ?Sized> Operation for Arc<O> {
    type Output = O::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn call(&self, ctx: CancellationToken) -> Result<Self::Output, TaskError> {
        (**self).call(ctx).await
    }
}
