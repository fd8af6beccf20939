//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the [`Runtime`](crate::Runtime).
//!
//! Config is used in three ways:
//! 1. **Runtime creation**: `Runtime::builder(config).build()` sizes the bus and the bridge
//! 2. **Guard defaults**: `Runtime::retry()` uses `retry`, `Runtime::spawn_operation` uses `timeout`
//! 3. **Pool defaults**: `Runtime::default_pool()` uses `pool_capacity`
//!
//! ## Sentinel values
//! - `timeout = 0s` → no default deadline (see [`Config::default_timeout`])
//! - `grace = 0s` → shutdown does not wait for units to stop

use std::time::Duration;

use crate::bridge::{DEFAULT_CPU_WORKERS, DEFAULT_IO_WORKERS};
use crate::error::RuntimeError;
use crate::policies::RetryPolicy;

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for tracked units to stop on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `io_workers` / `cpu_workers`: blocking pool sizes (must be `>= 1`)
/// - `pool_capacity`: bound used by `Runtime::default_pool` (must be `>= 1`)
/// - `timeout`: default deadline for operations spawned via the runtime (`0s` = none)
/// - `retry`: default policy for `Runtime::retry`
/// - `log_events`: attach the built-in `LogWriter` subscriber
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for tracked units to stop during shutdown.
    ///
    /// If exceeded, `Runtime::shutdown` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` messages skip older
    /// items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Number of workers in the blocking I/O pool.
    pub io_workers: usize,

    /// Number of workers in the CPU-bound pool.
    pub cpu_workers: usize,

    /// Default concurrency bound for pools created by the runtime.
    pub pool_capacity: usize,

    /// Default deadline for operations spawned through the runtime.
    ///
    /// - `Duration::ZERO` = no deadline
    /// - `> 0` = each spawned operation is wrapped in a `TimeoutGuard`
    pub timeout: Duration,

    /// Default retry policy handed out by `Runtime::retry`.
    pub retry: RetryPolicy,

    /// Attach the built-in `LogWriter` (requires the `logging` feature).
    pub log_events: bool,
}

impl Config {
    /// Returns the default deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → operations spawned through the runtime time out after `d`
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Rejects zero-sized pools.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.io_workers == 0 || self.cpu_workers == 0 {
            return Err(RuntimeError::invalid(format!(
                "worker pools need at least one worker (io={}, cpu={})",
                self.io_workers, self.cpu_workers
            )));
        }
        if self.pool_capacity == 0 {
            return Err(RuntimeError::invalid("pool_capacity must be >= 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `io_workers = 10`, `cpu_workers = 4`
    /// - `pool_capacity = 10`
    /// - `timeout = 0s` (no deadline)
    /// - `retry = RetryPolicy::default()` (3 attempts, 1s doubling)
    /// - `log_events = true`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            io_workers: DEFAULT_IO_WORKERS,
            cpu_workers: DEFAULT_CPU_WORKERS,
            pool_capacity: 10,
            timeout: Duration::ZERO,
            retry: RetryPolicy::default(),
            log_events: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_means_none() {
        let mut cfg = Config::default();
        assert_eq!(cfg.default_timeout(), None);
        cfg.timeout = Duration::from_secs(3);
        assert_eq!(cfg.default_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn zero_sized_pools_are_rejected() {
        assert!(Config::default().validate().is_ok());

        let cfg = Config {
            cpu_workers: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            pool_capacity: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
