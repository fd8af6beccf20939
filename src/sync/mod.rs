//! Task-aware synchronization primitives.
//!
//! - [`ReentrantLock`] mutual exclusion that the owning unit may re-enter
//! - [`ReentrantGuard`] scoped ownership, released on drop

mod reentrant;

pub use reentrant::{ReentrantGuard, ReentrantLock};
