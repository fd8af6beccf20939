//! Bridge from async code to blocking work.
//!
//! Blocking calls (file I/O, synchronous client libraries, CPU-heavy parsing) must not
//! run on the async workers. The bridge hands them to tokio's blocking threads while
//! enforcing a per-pool worker limit.
//!
//! ## Contents
//! - [`BlockingPool`]   one bounded pool (semaphore + `spawn_blocking`)
//! - [`ExecutorBridge`] an I/O pool and a CPU pool, selected via [`PoolKind`]
//!
//! ```text
//! caller.await ──► acquire permit (queues when all workers busy)
//!                    └─► spawn_blocking(f) ── permit released when f returns
//!                          └─► Ok(T) | Err(E.into()) | panic → TaskError::Panicked
//! ```

mod executor;
mod pool;

pub use executor::{ExecutorBridge, PoolKind};
pub(crate) use executor::{DEFAULT_CPU_WORKERS, DEFAULT_IO_WORKERS};
pub use pool::BlockingPool;
