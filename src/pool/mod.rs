//! Bounded concurrent execution.
//!
//! - [`TaskPool`] admits at most N units at a time and gathers their results in
//!   submission order
//! - [`Callbacks`] per-unit completion hooks (`on_success` / `on_failure`)

mod callbacks;
mod ledger;
mod task_pool;

pub use callbacks::Callbacks;
pub use task_pool::TaskPool;
