//! # Runtime: process-wide context for spawning, guarding and shutting down work.
//!
//! The [`Runtime`] owns the event bus, the subscriber fan-out, the
//! [`TaskRegistry`] and the [`ExecutorBridge`]. It is created once at process start
//! and handed (by reference or `Arc`) to the code that needs it.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`](crate::SubscriberSet)
//! - spawn tracked units, bounded pools and gathers through the registry
//! - hand out retry / timeout guards wired to the bus and configured defaults
//! - run blocking closures on the I/O or CPU pool
//! - perform graceful shutdown within [`Config::grace`]
//!
//! ## High-level architecture
//! ```text
//! RuntimeBuilder::build(cfg, subscribers)
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SubscriberSet (+ LogWriter when cfg.log_events)
//!   │     └─► listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   ├─► TaskRegistry (units are children of runtime_token)
//!   └─► ExecutorBridge (io_workers, cpu_workers)
//!
//! Shutdown path (shutdown() or run_until_signal()):
//!   Bus.publish(ShutdownRequested)
//!     └─► runtime_token.cancel()          → propagates to every unit token
//!     └─► registry.cancel_all_tracked() within cfg.grace:
//!            ├─ drained          → Bus.publish(AllStoppedWithin)
//!            └─ grace exceeded   → Bus.publish(GraceExceeded), stuck labels returned
//!     └─► stop listener (drains buffered events, waits for subscriber workers)
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{Config, Runtime, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.grace = Duration::from_secs(5);
//!     let rt = Runtime::new(cfg)?;
//!
//!     let results = rt
//!         .gather_with_concurrency(2, (1..=4u64).map(|n| async move {
//!             tokio::time::sleep(Duration::from_millis(n)).await;
//!             Ok::<_, TaskError>(n * n)
//!         }))
//!         .await?;
//!     assert_eq!(results[3], Ok(16));
//!
//!     let checksum = rt.run_cpu(|| Ok::<_, TaskError>((1..=100u32).sum::<u32>())).await?;
//!     assert_eq!(checksum, 5050);
//!
//!     rt.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::ExecutorBridge;
use crate::core::{Config, RuntimeBuilder, TaskRegistry, shutdown};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::guards::{Retry, TimeoutGuard};
use crate::policies::RetryPolicy;
use crate::pool::TaskPool;
use crate::tasks::{Operation, TaskJoin};

/// Process-wide context owning the bus, registry and blocking pools.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    registry: TaskRegistry,
    bridge: ExecutorBridge,
    runtime_token: CancellationToken,
    listener_stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    /// Creates a runtime without extra subscribers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(cfg: Config) -> Result<Self, RuntimeError> {
        Self::builder(cfg).build()
    }

    /// Starts building a runtime.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        registry: TaskRegistry,
        bridge: ExecutorBridge,
        runtime_token: CancellationToken,
        listener_stop: CancellationToken,
        listener: Mutex<Option<JoinHandle<()>>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            bridge,
            runtime_token,
            listener_stop,
            listener,
        }
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by every component of this runtime.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Registry of live tracked units.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Blocking I/O and CPU pools.
    pub fn bridge(&self) -> &ExecutorBridge {
        &self.bridge
    }

    /// Starts `fut` as a tracked unit.
    pub fn spawn<T, F>(&self, fut: F) -> TaskJoin<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.registry.spawn(fut)
    }

    /// Starts `fut` as a tracked unit labelled `name`.
    pub fn spawn_named<T, F>(&self, name: impl Into<Arc<str>>, fut: F) -> TaskJoin<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.registry.spawn_named(name, fut)
    }

    /// Starts `op` as a tracked unit, bounded by [`Config::default_timeout`] when set.
    pub fn spawn_operation<O: Operation>(&self, op: O) -> TaskJoin<O::Output> {
        match self.cfg.default_timeout() {
            Some(deadline) => self.registry.spawn_operation(self.timeout(deadline).wrap(op)),
            None => self.registry.spawn_operation(op),
        }
    }

    /// Cancels every tracked unit and waits until all of them are terminal.
    pub async fn cancel_all_tracked(&self) {
        self.registry.cancel_all_tracked().await;
    }

    /// Runs `futs` with at most `n` in flight; results come back in input order.
    pub async fn gather_with_concurrency<T, F, I>(
        &self,
        n: usize,
        futs: I,
    ) -> Result<Vec<Result<T, TaskError>>, RuntimeError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        self.registry.gather_with_concurrency(n, futs).await
    }

    /// Like [`gather_with_concurrency`](Self::gather_with_concurrency), yielding the
    /// first failure in input order.
    pub async fn try_gather_with_concurrency<T, F, I>(
        &self,
        n: usize,
        futs: I,
    ) -> Result<Result<Vec<T>, TaskError>, RuntimeError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        self.registry.try_gather_with_concurrency(n, futs).await
    }

    /// Creates a tracked pool running at most `capacity` units at once.
    pub fn pool<T: Send + 'static>(&self, capacity: usize) -> Result<TaskPool<T>, RuntimeError> {
        TaskPool::tracked(capacity, &self.registry)
    }

    /// Creates a tracked pool bounded by [`Config::pool_capacity`].
    pub fn default_pool<T: Send + 'static>(&self) -> Result<TaskPool<T>, RuntimeError> {
        self.pool(self.cfg.pool_capacity)
    }

    /// Retry guard using [`Config::retry`], publishing to this runtime's bus.
    pub fn retry(&self) -> Retry {
        self.retry_with(self.cfg.retry.clone())
    }

    /// Retry guard using `policy`, publishing to this runtime's bus.
    pub fn retry_with(&self, policy: RetryPolicy) -> Retry {
        Retry::new(policy).with_bus(self.bus.clone())
    }

    /// Deadline guard publishing to this runtime's bus.
    pub fn timeout(&self, deadline: Duration) -> TimeoutGuard {
        TimeoutGuard::new(deadline).with_bus(self.bus.clone())
    }

    /// Runs `f` on the blocking I/O pool.
    pub async fn run_blocking<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.bridge.run_blocking(f).await
    }

    /// Runs `f` on the CPU pool.
    pub async fn run_cpu<T, E, F>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + Send + 'static,
    {
        self.bridge.run_cpu(f).await
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then [`shutdown`](Self::shutdown).
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let _ = shutdown::wait_for_shutdown_signal().await;
        self.shutdown().await
    }

    /// Cancels every tracked unit and waits up to [`Config::grace`] for them to stop.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the labels of stuck units.
    ///
    /// Subscribers receive every event published up to this point before it returns.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        let res = match tokio::time::timeout(grace, self.registry.cancel_all_tracked()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.registry.stuck();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_timeout(grace)
                        .with_reason(stuck.join(", ")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        self.stop_listener().await;
        res
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    async fn stop_listener(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.listener_stop.cancel();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::Subscribe;
    use crate::tasks::{OperationFn, TaskState, unit::Unit};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    impl Recorder {
        fn kinds(&self) -> Vec<EventKind> {
            self.0.lock().expect("recorder lock").clone()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().expect("recorder lock").push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn quiet(grace: Duration) -> Config {
        Config {
            grace,
            log_events: false,
            ..Config::default()
        }
    }

    fn runtime(cfg: Config) -> (Runtime, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let rt = Runtime::builder(cfg)
            .with_subscriber(recorder.clone())
            .build()
            .expect("runtime");
        (rt, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_tracked_units_within_grace() {
        let (rt, recorder) = runtime(quiet(Duration::from_secs(5)));

        let joins: Vec<_> = (0..3)
            .map(|i| {
                rt.spawn_named(format!("watcher-{i}"), async {
                    sleep(Duration::from_secs(3600)).await;
                    Ok::<_, TaskError>(())
                })
            })
            .collect();
        assert_eq!(rt.registry().len(), 3);

        rt.shutdown().await.expect("clean shutdown");
        assert!(rt.registry().is_empty());
        assert!(rt.is_shutting_down());
        for join in joins {
            assert_eq!(join.handle().state(), TaskState::Cancelled);
        }

        let kinds = recorder.kinds();
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
        assert!(!kinds.contains(&EventKind::UnitFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_unit_exceeds_grace() {
        let (rt, recorder) = runtime(quiet(Duration::from_secs(1)));

        // A unit whose work never observes its token.
        let (_unit, handle) = Unit::new(Some("stubborn".into()), rt.registry().child_token());
        let _join = rt.registry().track(handle, async {
            sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        });

        let err = rt.shutdown().await.expect_err("grace exceeded");
        match err {
            RuntimeError::GraceExceeded { grace, stuck } => {
                assert_eq!(grace, Duration::from_secs(1));
                assert_eq!(stuck, vec!["stubborn".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(recorder.kinds().last(), Some(&EventKind::GraceExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_bounds_spawned_operations() {
        let mut cfg = quiet(Duration::from_secs(1));
        cfg.timeout = Duration::from_millis(200);
        let (rt, recorder) = runtime(cfg);

        let join = rt.spawn_operation(OperationFn::new(
            "hang",
            |_ctx: CancellationToken| async {
                sleep(Duration::from_secs(30)).await;
                Ok::<_, TaskError>(())
            },
        ));
        let res = join.join().await;
        assert!(matches!(res, Err(TaskError::Timeout { ref task, .. }) if task == "hang"));

        rt.shutdown().await.expect("shutdown");
        let kinds = recorder.kinds();
        assert!(kinds.contains(&EventKind::TimeoutHit));
        assert!(kinds.contains(&EventKind::UnitFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_guards_publish_to_the_runtime_bus() {
        let mut cfg = quiet(Duration::from_secs(1));
        cfg.retry = RetryPolicy::new(2, Duration::from_millis(10), 2.0).expect("policy");
        let (rt, recorder) = runtime(cfg);

        let calls = AtomicU32::new(0);
        let res: Result<(), _> = rt
            .retry()
            .run("upstream", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TaskError::fail("502"))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        rt.shutdown().await.expect("shutdown");
        let kinds = recorder.kinds();
        assert!(kinds.contains(&EventKind::RetryScheduled));
        assert!(kinds.contains(&EventKind::RetryExhausted));
    }

    #[tokio::test]
    async fn blocking_calls_and_pools_are_available() {
        let (rt, _recorder) = runtime(quiet(Duration::from_secs(1)));

        let text = rt
            .run_blocking(|| Ok::<_, TaskError>("from a blocking thread".to_string()))
            .await;
        assert_eq!(text.as_deref(), Ok("from a blocking thread"));

        let mut pool = rt.default_pool::<usize>().expect("pool");
        assert_eq!(pool.capacity(), 10);
        pool.submit(async { Ok(1) });
        assert_eq!(pool.gather_all().await, vec![Ok(1)]);

        assert!(rt.pool::<()>(0).is_err());
        rt.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_build() {
        let cfg = Config {
            io_workers: 0,
            ..quiet(Duration::from_secs(1))
        };
        assert!(matches!(
            Runtime::new(cfg),
            Err(RuntimeError::InvalidConfig { .. })
        ));
    }
}
