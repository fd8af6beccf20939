//! # Retry decorator.
//!
//! [`Retry`] re-attempts a failing operation according to a [`RetryPolicy`].
//!
//! ## Flow
//! ```text
//! attempt = 1
//! loop {
//!   ├─► op() ── Ok ─────────────────────────────► return Ok
//!   │      └── Err(e)
//!   │            ├─ !policy.should_retry(e) ─────► return Err(e)   (no attempt consumed)
//!   │            ├─ attempt == attempts ─────────► publish RetryExhausted, return Err(e)
//!   │            └─ otherwise:
//!   │                 ├─ delay = policy.delay_after(attempt)
//!   │                 ├─ publish RetryScheduled{ attempt, delay, reason }
//!   │                 └─ sleep(delay)               (cancellable in operation form)
//!   └─► attempt += 1
//! }
//! ```
//!
//! ## Rules
//! - The last error is returned **unchanged**; callers see the same kind they would
//!   have seen without the decorator.
//! - A single-attempt policy is a passthrough: no delay and no events.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;
use crate::tasks::Operation;

/// Retry decorator configured by a [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct Retry {
    policy: RetryPolicy,
    bus: Option<Bus>,
}

impl Retry {
    /// Creates a decorator that does not publish events.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, bus: None }
    }

    /// Publishes `RetryScheduled` / `RetryExhausted` to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The configured policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, fails with a non-retryable kind, or attempts run out.
    ///
    /// `op` is invoked once per attempt and must build a fresh future each time.
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::time::Duration;
    /// use taskgate::{Retry, RetryPolicy, TaskError};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let calls = AtomicU32::new(0);
    /// let retry = Retry::new(RetryPolicy::new(3, Duration::from_millis(1), 2.0)?);
    ///
    /// let value = retry
    ///     .run("flaky", || async {
    ///         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
    ///             Err(TaskError::fail("transient"))
    ///         } else {
    ///             Ok("ok")
    ///         }
    ///     })
    ///     .await?;
    ///
    /// assert_eq!(value, "ok");
    /// assert_eq!(calls.load(Ordering::SeqCst), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<T, F, Fut>(&self, name: &str, op: F) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        self.run_until(name, op, None).await
    }

    /// Wraps an [`Operation`]; the result is itself an operation.
    pub fn wrap<O: Operation>(self, inner: O) -> Retrying<O> {
        Retrying { retry: self, inner }
    }

    async fn run_until<T, F, Fut>(
        &self,
        name: &str,
        mut op: F,
        ctx: Option<&CancellationToken>,
    ) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            let Some(delay) = self.schedule(name, attempt, &err) else {
                return Err(err);
            };

            match ctx {
                Some(token) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => return Err(TaskError::Canceled),
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            attempt += 1;
        }
    }

    /// Decides what follows failed attempt `attempt`: `Some(delay)` to retry, `None` to give up.
    fn schedule(&self, name: &str, attempt: u32, err: &TaskError) -> Option<Duration> {
        if !self.policy.should_retry(err) {
            return None;
        }
        if attempt >= self.policy.attempts() {
            if self.policy.attempts() > 1 {
                self.publish(
                    Event::new(EventKind::RetryExhausted)
                        .with_task(name)
                        .with_attempt(attempt)
                        .with_reason(err.to_string()),
                );
            }
            return None;
        }

        let delay = self.policy.delay_after(attempt);
        self.publish(
            Event::new(EventKind::RetryScheduled)
                .with_task(name)
                .with_attempt(attempt)
                .with_delay(delay)
                .with_reason(err.to_string()),
        );
        Some(delay)
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

/// An [`Operation`] decorated with [`Retry`].
///
/// Backoff sleeps stop early when the caller's token is cancelled.
pub struct Retrying<O> {
    retry: Retry,
    inner: O,
}

#[async_trait]
impl<O: Operation> Operation for Retrying<O> {
    type Output = O::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn call(&self, ctx: CancellationToken) -> Result<Self::Output, TaskError> {
        self.retry
            .run_until(
                self.inner.name(),
                || self.inner.call(ctx.child_token()),
                Some(&ctx),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskErrorKind;
    use crate::tasks::OperationFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(100), 2.0).expect("valid policy")
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_is_invoked_exactly_attempts_times() {
        let calls = AtomicU32::new(0);
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let retry = Retry::new(policy(3)).with_bus(bus);

        let started = Instant::now();
        let res: Result<(), _> = retry
            .run("always-down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TaskError::fail("503 service unavailable"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res, Err(TaskError::fail("503 service unavailable")));
        // 100ms after attempt 1, 200ms after attempt 2.
        assert_eq!(started.elapsed(), Duration::from_millis(300));

        let first = rx.recv().await.expect("first retry event");
        assert_eq!(first.kind, EventKind::RetryScheduled);
        assert_eq!((first.attempt, first.delay_ms), (Some(1), Some(100)));
        let second = rx.recv().await.expect("second retry event");
        assert_eq!((second.attempt, second.delay_ms), (Some(2), Some(200)));
        let last = rx.recv().await.expect("exhausted event");
        assert_eq!(last.kind, EventKind::RetryExhausted);
        assert_eq!(last.task.as_deref(), Some("always-down"));
    }

    #[tokio::test(start_paused = true)]
    async fn long_delays_keep_growing_without_a_cap() {
        let policy = RetryPolicy::new(3, Duration::from_secs(40), 2.0).expect("valid policy");
        assert_eq!(policy.delay_after(2), Duration::from_secs(80));

        let started = Instant::now();
        let res: Result<(), _> = Retry::new(policy)
            .run("slow-upstream", || async { Err(TaskError::fail("gateway timeout")) })
            .await;

        assert!(res.is_err());
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let retry = Retry::new(policy(3));

        let res = retry
            .run("flaky", || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(TaskError::fail("reset by peer")),
                    n => Ok(n + 1),
                }
            })
            .await;

        assert_eq!(res, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_matching_kind_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let retry = Retry::new(policy(5).retry_on([TaskErrorKind::Timeout]));

        let started = Instant::now();
        let res: Result<(), _> = retry
            .run("unauthorized", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TaskError::fail("401"))
            })
            .await;

        assert_eq!(res, Err(TaskError::fail("401")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_is_passthrough() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let retry = Retry::new(RetryPolicy::passthrough()).with_bus(bus);

        let started = Instant::now();
        let res: Result<(), _> = retry
            .run("once", || async { Err(TaskError::fail("nope")) })
            .await;

        assert!(res.is_err());
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn operation_form_stops_backoff_on_cancel() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = Retry::new(RetryPolicy::new(10, Duration::from_secs(60), 1.0).expect("valid"))
            .wrap(OperationFn::new("slow-retry", move |_ctx: CancellationToken| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TaskError::fail("down"))
                }
            }));
        assert_eq!(op.name(), "slow-retry");

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            cancel.cancel();
        });

        let res = op.call(token).await;
        assert_eq!(res, Err(TaskError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
