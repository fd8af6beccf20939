//! # Deadline decorator.
//!
//! [`TimeoutGuard`] bounds an awaited operation by a deadline. When the deadline
//! passes first the inner future is dropped (cancelled at its next suspension point),
//! a `TimeoutHit` event is published and [`TaskError::Timeout`] is returned.
//!
//! ```text
//! select!
//!   ├─ fut completes ─────► its result, unchanged
//!   └─ deadline elapses ──► drop fut, cancel child token (operation form),
//!                           publish TimeoutHit, Err(Timeout { task, timeout })
//! ```
//!
//! A zero deadline follows `tokio::time::timeout`: an operation that is already
//! complete on its first poll still wins, anything else times out.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::Operation;

/// Deadline decorator.
#[derive(Clone, Debug)]
pub struct TimeoutGuard {
    deadline: Duration,
    bus: Option<Bus>,
}

impl TimeoutGuard {
    /// Creates a guard that does not publish events.
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            bus: None,
        }
    }

    /// Creates a guard from fractional seconds.
    ///
    /// Negative, NaN or overflowing values are rejected.
    pub fn from_secs_f64(secs: f64) -> Result<Self, RuntimeError> {
        Duration::try_from_secs_f64(secs)
            .map(Self::new)
            .map_err(|e| RuntimeError::invalid(format!("timeout {secs}s: {e}")))
    }

    /// Publishes `TimeoutHit` to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The configured deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Awaits `fut` for at most the deadline.
    pub async fn run<T, F>(&self, name: &str, fut: F) -> Result<T, TaskError>
    where
        F: Future<Output = Result<T, TaskError>>,
    {
        match time::timeout(self.deadline, fut).await {
            Ok(res) => res,
            Err(_elapsed) => Err(self.expired(name)),
        }
    }

    /// Like [`run`](Self::run), but a timeout yields `default` instead of an error.
    ///
    /// Failures of the operation itself still propagate.
    pub async fn run_or_default<T, F>(&self, name: &str, fut: F, default: T) -> Result<T, TaskError>
    where
        F: Future<Output = Result<T, TaskError>>,
    {
        match self.run(name, fut).await {
            Err(TaskError::Timeout { .. }) => Ok(default),
            other => other,
        }
    }

    /// Wraps an [`Operation`]; the result is itself an operation.
    ///
    /// Each call hands the inner operation a child of the caller's token; the child
    /// is cancelled when the deadline elapses.
    pub fn wrap<O: Operation>(self, inner: O) -> Timed<O> {
        Timed { guard: self, inner }
    }

    fn expired(&self, name: &str) -> TaskError {
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::new(EventKind::TimeoutHit)
                    .with_task(name)
                    .with_timeout(self.deadline),
            );
        }
        TaskError::Timeout {
            task: name.to_string(),
            timeout: self.deadline,
        }
    }
}

/// An [`Operation`] decorated with [`TimeoutGuard`].
pub struct Timed<O> {
    guard: TimeoutGuard,
    inner: O,
}

#[async_trait]
impl<O: Operation> Operation for Timed<O> {
    type Output = O::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn call(&self, ctx: CancellationToken) -> Result<Self::Output, TaskError> {
        let child = ctx.child_token();
        match time::timeout(self.guard.deadline, self.inner.call(child.clone())).await {
            Ok(res) => res,
            Err(_elapsed) => {
                child.cancel();
                Err(self.guard.expired(self.inner.name()))
            }
        }
    }
}

/// Awaits `fut` for at most `deadline`, failing with [`TaskError::Timeout`].
///
/// ```rust
/// use std::time::Duration;
/// use taskgate::{TaskError, guards};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let res: Result<(), _> = guards::timeout("hang", Duration::from_millis(10), async {
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     Ok(())
/// })
/// .await;
///
/// assert!(matches!(res, Err(TaskError::Timeout { .. })));
/// # }
/// ```
pub async fn timeout<T, F>(name: &str, deadline: Duration, fut: F) -> Result<T, TaskError>
where
    F: Future<Output = Result<T, TaskError>>,
{
    TimeoutGuard::new(deadline).run(name, fut).await
}

/// Awaits `fut` for at most `deadline`; on expiry returns `default`.
pub async fn timeout_or_default<T, F>(fut: F, deadline: Duration, default: T) -> T
where
    F: Future<Output = T>,
{
    time::timeout(deadline, fut).await.unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OperationFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn slow_operation_fails_at_deadline() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let guard = TimeoutGuard::new(Duration::from_millis(100)).with_bus(bus);

        let started = Instant::now();
        let res: Result<(), _> = guard
            .run("fetch-library", async {
                time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert_eq!(started.elapsed(), Duration::from_millis(100));
        assert_eq!(
            res,
            Err(TaskError::Timeout {
                task: "fetch-library".into(),
                timeout: Duration::from_millis(100),
            })
        );
        let ev = rx.recv().await.expect("timeout event");
        assert_eq!(ev.kind, EventKind::TimeoutHit);
        assert_eq!(ev.timeout_ms, Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_operation_result_passes_through() {
        let guard = TimeoutGuard::new(Duration::from_secs(1));
        let ok = guard
            .run("quick", async {
                time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            })
            .await;
        assert_eq!(ok, Ok(7));

        let err: Result<(), _> = guard
            .run("broken", async { Err(TaskError::fatal("bad token")) })
            .await;
        assert_eq!(err, Err(TaskError::fatal("bad token")));
    }

    #[tokio::test(start_paused = true)]
    async fn default_is_returned_on_expiry_only() {
        let guard = TimeoutGuard::new(Duration::from_millis(50));
        let slow = guard
            .run_or_default(
                "slow",
                async {
                    time::sleep(Duration::from_secs(1)).await;
                    Ok(vec![1, 2])
                },
                Vec::new(),
            )
            .await;
        assert_eq!(slow, Ok(Vec::new()));

        let failing: Result<Vec<i32>, _> = guard
            .run_or_default("failing", async { Err(TaskError::fail("x")) }, Vec::new())
            .await;
        assert!(failing.is_err());

        let count = timeout_or_default(
            async {
                time::sleep(Duration::from_secs(1)).await;
                10
            },
            Duration::from_millis(1),
            0,
        )
        .await;
        assert_eq!(count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_form_cancels_child_token() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();
        let op = TimeoutGuard::new(Duration::from_millis(20)).wrap(OperationFn::new(
            "stalled",
            move |ctx: CancellationToken| {
                let flag = flag.clone();
                async move {
                    let watcher = ctx.clone();
                    tokio::spawn(async move {
                        watcher.cancelled().await;
                        flag.store(true, Ordering::SeqCst);
                    });
                    time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, TaskError>(())
                }
            },
        ));

        let parent = CancellationToken::new();
        let res = op.call(parent.clone()).await;
        assert!(matches!(res, Err(TaskError::Timeout { .. })));
        assert!(!parent.is_cancelled());

        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn negative_seconds_are_rejected() {
        assert!(TimeoutGuard::from_secs_f64(-1.0).is_err());
        assert!(TimeoutGuard::from_secs_f64(f64::NAN).is_err());
        assert_eq!(
            TimeoutGuard::from_secs_f64(0.25).map(|g| g.deadline()).ok(),
            Some(Duration::from_millis(250))
        );
    }
}
