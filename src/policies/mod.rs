//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed operation is
//! attempted again and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]   attempts + backoff + retryable failure kinds
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! RetryPolicy { attempts, backoff, retry_on }
//!      └─► guards::Retry uses:
//!           - should_retry(err) to decide retry vs propagate
//!           - delay_after(attempt) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 3 attempts, retry on `Fail`/`Timeout`.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=unbounded, jitter=None.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
