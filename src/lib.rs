//! # taskgate
//!
//! **Taskgate** is a concurrency-control core for async services built on tokio.
//!
//! It gives domain code a small set of primitives for the awkward parts of doing
//! many things at once: escaping blocking calls, retrying and bounding flaky
//! operations, serialising shared state, fanning out with a concurrency cap, and
//! keeping track of everything that was spawned so shutdown can stop it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                     domain code (handlers, jobs, CLIs)
//!      ┌───────────────┬───────────────┼──────────────┬────────────────┐
//!      ▼               ▼               ▼              ▼                ▼
//! ┌──────────┐  ┌─────────────┐ ┌──────────────┐ ┌──────────┐  ┌────────────────┐
//! │ Executor │  │ Retry /     │ │ Reentrant    │ │ TaskPool │  │ TaskRegistry   │
//! │ Bridge   │  │ TimeoutGuard│ │ Lock         │ │ (N slots)│  │ (tracked units)│
//! │ io / cpu │  │ (decorators)│ │ (TaskId key) │ └────┬─────┘  └───────┬────────┘
//! └──────────┘  └──────┬──────┘ └──────────────┘      └──── tracked ───┘
//!                      │                                              │
//!                      │ RetryScheduled / RetryExhausted / TimeoutHit │ UnitSpawned / UnitFailed / ...
//!                      ▼                                              ▼
//! ┌───────────────────────────────────────────────────────────────────────────────┐
//! │                         Bus (broadcast channel)                               │
//! │                     (capacity: Config::bus_capacity)                          │
//! └─────────────────────────────────────┬─────────────────────────────────────────┘
//!                                       ▼
//!                            Runtime subscriber listener
//!                                       ▼
//!                                 SubscriberSet
//!                           ┌───────────┼───────────┐
//!                           ▼           ▼           ▼
//!                       LogWriter    metrics     custom ...
//!                       (tracing)
//! ```
//!
//! ### Unit lifecycle
//! ```text
//! spawn / submit ──► Pending ──► (admission, pools only) ──► Running
//!                                                             │
//!                       ┌─────────────────┬───────────────────┤
//!                       ▼                 ▼                   ▼
//!                   Completed          Failed             Cancelled
//!                 (Ok(value))   (Err / panic captured)  (token cancelled)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                   |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Bridge**        | Bounded blocking pools for I/O and CPU work.                 | [`ExecutorBridge`], [`BlockingPool`]        |
//! | **Guards**        | Retry with backoff; deadlines with cancellation.             | [`Retry`], [`TimeoutGuard`]                 |
//! | **Policies**      | Attempts, backoff growth, jitter, retryable kinds.           | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Sync**          | Reentrant lock keyed by logical task identity.               | [`ReentrantLock`], [`TaskId`]               |
//! | **Pools**         | At most N units in flight, results in submission order.      | [`TaskPool`], [`Callbacks`]                 |
//! | **Tracking**      | Registry of live units; cancel-all; bounded gather.          | [`TaskRegistry`], [`TaskHandle`]            |
//! | **Runtime**       | Process-wide context and graceful shutdown.                  | [`Runtime`], [`Config`]                     |
//! | **Events**        | Structured lifecycle events and subscribers.                 | [`Event`], [`Subscribe`]                    |
//! | **Errors**        | Typed failures of units, the core, and the lock.             | [`TaskError`], [`RuntimeError`], [`LockError`] |
//!
//! ## Optional features
//! - `logging` _(default)_: exports [`LogWriter`], a subscriber rendering events via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{Config, RetryPolicy, Runtime, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rt = Runtime::new(Config::default())?;
//!
//!     // Retry a flaky call, each attempt bounded by a deadline.
//!     let deadline = rt.timeout(Duration::from_secs(2));
//!     let retry = rt.retry_with(RetryPolicy::new(3, Duration::from_millis(10), 2.0)?);
//!     let title = retry
//!         .run("fetch-title", || deadline.run("fetch-title", async {
//!             Ok::<_, TaskError>("Blade Runner".to_string())
//!         }))
//!         .await?;
//!     assert_eq!(title, "Blade Runner");
//!
//!     // Fan out with at most 4 in flight; results keep input order.
//!     let sizes = rt
//!         .gather_with_concurrency(4, (0..8u64).map(|i| async move { Ok::<_, TaskError>(i * 2) }))
//!         .await?;
//!     assert_eq!(sizes[7], Ok(14));
//!
//!     rt.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod bridge;
mod core;
mod error;
mod events;
pub mod guards;
mod policies;
mod pool;
mod subscribers;
mod sync;
mod tasks;

// ---- Public re-exports ----

pub use bridge::{BlockingPool, ExecutorBridge, PoolKind};
pub use core::{Config, Runtime, RuntimeBuilder, TaskRegistry};
pub use error::{LockError, RuntimeError, TaskError, TaskErrorKind};
pub use events::{Bus, Event, EventKind};
pub use guards::{Retry, Retrying, Timed, TimeoutGuard};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use pool::{Callbacks, TaskPool};
pub use subscribers::{Subscribe, SubscriberSet};
pub use sync::{ReentrantGuard, ReentrantLock};
pub use tasks::{Operation, OperationFn, TaskHandle, TaskId, TaskJoin, TaskState};

// Built-in tracing subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
