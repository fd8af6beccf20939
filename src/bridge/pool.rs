//! # Bounded blocking pool.
//!
//! [`BlockingPool`] runs synchronous closures on tokio's blocking threads, at most
//! `limit` at a time. Callers beyond the limit wait for a free worker; exhaustion is
//! never an error.
//!
//! The permit travels into the worker closure, so a worker whose caller stopped
//! waiting (timeout, cancellation) still counts against the limit until it returns.
//! Blocking code cannot be interrupted; [`BlockingPool::run_cancellable`] hands it a
//! token to poll instead.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, TaskError};
use crate::tasks::join_unit;

/// Bounded pool of blocking workers.
#[derive(Clone, Debug)]
pub struct BlockingPool {
    name: &'static str,
    limit: usize,
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    /// Creates a pool allowing `limit` concurrent workers.
    ///
    /// Fails with [`RuntimeError::InvalidConfig`] if `limit == 0`.
    pub fn new(name: &'static str, limit: usize) -> Result<Self, RuntimeError> {
        if limit == 0 {
            return Err(RuntimeError::invalid(format!(
                "{name} pool needs at least one worker"
            )));
        }
        Ok(Self::with_limit(name, limit))
    }

    pub(crate) fn with_limit(name: &'static str, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name,
            limit,
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Pool name (used in error messages).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of concurrent workers.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Workers currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Workers currently busy.
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }

    /// Runs `f` on a blocking worker and awaits its result.
    ///
    /// ```rust
    /// use taskgate::BlockingPool;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = BlockingPool::new("io", 2)?;
    /// let len = pool
    ///     .run(|| std::fs::read_to_string("Cargo.toml").map(|s| s.len()))
    ///     .await?;
    /// assert!(len > 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.run_cancellable(move |_token| f()).await
    }

    /// Like [`run`](Self::run), but `f` receives a token that is cancelled when the
    /// awaiting future is dropped.
    pub async fn run_cancellable<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(CancellationToken) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_closed| TaskError::fatal(format!("{} pool is closed", self.name)))?;

        let token = CancellationToken::new();
        let stop_on_drop = token.clone().drop_guard();

        let worker = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f(token).map_err(Into::into)
        });
        let res = join_unit(worker).await;

        stop_on_drop.disarm();
        res
    }
}
