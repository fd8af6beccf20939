//! Decorators for awaited operations.
//!
//! - [`Retry`] re-attempts failures per a [`RetryPolicy`](crate::RetryPolicy)
//! - [`TimeoutGuard`] bounds an operation by a deadline
//!
//! Both work two ways: on an ad-hoc future (`run`) or wrapped around an
//! [`Operation`](crate::Operation) (`wrap`), producing another operation. Wrapping
//! composes; `Retry::wrap(TimeoutGuard::wrap(op))` gives every attempt its own deadline.
//!
//! Guards publish to a [`Bus`](crate::Bus) only when one is attached with `with_bus`.
//! Guards created through [`Runtime`](crate::Runtime) carry the runtime bus.

mod retry;
mod timeout;

pub use retry::{Retry, Retrying};
pub use timeout::{Timed, TimeoutGuard, timeout, timeout_or_default};
