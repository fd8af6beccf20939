//! Runtime core: configuration, unit tracking and lifecycle.
//!
//! The public entry point is [`Runtime`], created through [`RuntimeBuilder`]. It owns
//! the event bus, the [`TaskRegistry`] of live units and the blocking pools, and
//! drives graceful shutdown.
//!
//! Internal modules:
//! - [`config`]: runtime-wide settings and defaults;
//! - [`registry`]: tracks units spawned through the core until they terminate;
//! - [`builder`]: wires bus, subscribers, registry and bridge together;
//! - [`runtime`]: spawning/guard/bridge facade and shutdown;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod config;
mod registry;
mod runtime;
mod shutdown;

pub use builder::RuntimeBuilder;
pub use config::Config;
pub use registry::TaskRegistry;
pub use runtime::Runtime;
