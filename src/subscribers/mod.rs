//! # Event subscribers for the taskgate runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`] that turns events into `tracing` records.
//!
//! ## Architecture
//! ```text
//!   Registry/Retry/Timeout ── publish(Event) ──► Bus ──► Runtime listener
//!                                                             │
//!                                                    SubscriberSet::emit(&Event)
//!                                                    ┌────────┼─────────┐
//!                                                    ▼        ▼         ▼
//!                                                LogWriter  Metrics   Custom ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
