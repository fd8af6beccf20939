//! # I/O and CPU blocking pools.
//!
//! [`ExecutorBridge`] owns two independent [`BlockingPool`]s so a burst of slow I/O
//! calls cannot starve CPU-bound work (and the reverse). Callers pick the pool.

use tokio_util::sync::CancellationToken;

use crate::bridge::BlockingPool;
use crate::error::{RuntimeError, TaskError};

/// Default number of I/O workers.
pub(crate) const DEFAULT_IO_WORKERS: usize = 10;
/// Default number of CPU workers.
pub(crate) const DEFAULT_CPU_WORKERS: usize = 4;

/// Which pool a blocking call runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Blocking I/O: files, synchronous network clients.
    Io,
    /// CPU-bound work: parsing, hashing, compression.
    Cpu,
}

/// Pair of bounded blocking pools.
#[derive(Clone, Debug)]
pub struct ExecutorBridge {
    io: BlockingPool,
    cpu: BlockingPool,
}

impl Default for ExecutorBridge {
    /// 10 I/O workers, 4 CPU workers.
    fn default() -> Self {
        Self {
            io: BlockingPool::with_limit("io", DEFAULT_IO_WORKERS),
            cpu: BlockingPool::with_limit("cpu", DEFAULT_CPU_WORKERS),
        }
    }
}

impl ExecutorBridge {
    /// Creates a bridge with explicit worker limits (both must be `>= 1`).
    pub fn new(io_workers: usize, cpu_workers: usize) -> Result<Self, RuntimeError> {
        Ok(Self {
            io: BlockingPool::new("io", io_workers)?,
            cpu: BlockingPool::new("cpu", cpu_workers)?,
        })
    }

    /// Returns the pool for `kind`.
    pub fn pool(&self, kind: PoolKind) -> &BlockingPool {
        match kind {
            PoolKind::Io => &self.io,
            PoolKind::Cpu => &self.cpu,
        }
    }

    /// Runs `f` on the I/O pool.
    pub async fn run_blocking<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.io.run(f).await
    }

    /// Runs `f` on the CPU pool.
    pub async fn run_cpu<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.cpu.run(f).await
    }

    /// Runs `f` on the pool selected by `kind`.
    pub async fn run_on<T, E, F>(&self, kind: PoolKind, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.pool(kind).run(f).await
    }

    /// Runs `f` on the pool selected by `kind`, handing it a cancellation token.
    pub async fn run_cancellable_on<T, E, F>(&self, kind: PoolKind, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(CancellationToken) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.pool(kind).run_cancellable(f).await
    }
}
