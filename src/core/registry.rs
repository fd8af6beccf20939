//! # Task registry - tracker of units spawned through the core.
//!
//! Every unit started through the [`Runtime`](crate::Runtime) (directly or via a
//! tracked [`TaskPool`](crate::TaskPool)) is recorded here until it terminates, so
//! shutdown can find and cancel it.
//!
//! ## Architecture
//! ```text
//! spawn / spawn_named / spawn_operation
//!   └─► Unit::new (child of runtime token)
//!         └─► track(handle, work)
//!               ├─► units.insert(id, handle)          ► UnitSpawned
//!               └─► tokio::spawn
//!                     └─► work.await
//!                           ├─ Ok          ► UnitCompleted
//!                           ├─ Canceled    ► UnitCancelled   (not an error)
//!                           └─ other Err   ► UnitFailed      (error with the unit's label)
//!                         units.remove(id)
//!
//! cancel_all_tracked
//!   └─► snapshot ─► cancel each ─► await terminated() on each ─► drop snapshot ids
//! ```
//!
//! ## Rules
//! - A unit is inserted **before** it is spawned, so it is never missed by a
//!   concurrent `cancel_all_tracked`.
//! - The map is guarded by a `std::sync::Mutex`; it is never held across `.await`.
//! - Failures are reported through the bus; a tracked unit's failure never
//!   propagates to its spawner unless the spawner joins it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::pool::TaskPool;
use crate::tasks::{Operation, TaskHandle, TaskId, TaskJoin, unit::Unit};

#[derive(Debug)]
struct Inner {
    units: Mutex<HashMap<TaskId, TaskHandle>>,
    bus: Bus,
    runtime_token: CancellationToken,
}

/// Registry of live units spawned through the core.
///
/// Cheap to clone; all clones share the same map.
#[derive(Clone, Debug)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    /// Creates a standalone registry publishing lifecycle events to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self::with_token(bus, CancellationToken::new())
    }

    /// Creates a registry whose units are children of `runtime_token`.
    pub(crate) fn with_token(bus: Bus, runtime_token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                units: Mutex::new(HashMap::new()),
                bus,
                runtime_token,
            }),
        }
    }

    /// Starts `fut` immediately as a tracked unit.
    pub fn spawn<T, F>(&self, fut: F) -> TaskJoin<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_unit(None, move |_token| fut)
    }

    /// Starts `fut` immediately as a tracked unit labelled `name`.
    pub fn spawn_named<T, F>(&self, name: impl Into<Arc<str>>, fut: F) -> TaskJoin<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_unit(Some(name.into()), move |_token| fut)
    }

    /// Starts `op` immediately as a tracked unit labelled with the operation's name.
    ///
    /// The operation receives the unit's cancellation token.
    pub fn spawn_operation<O: Operation>(&self, op: O) -> TaskJoin<O::Output> {
        let name: Arc<str> = Arc::from(op.name());
        self.spawn_unit(Some(name), move |token| async move { op.call(token).await })
    }

    /// Cancels every tracked unit and waits until all of them are terminal.
    pub async fn cancel_all_tracked(&self) {
        let snapshot: Vec<TaskHandle> = self.units().values().cloned().collect();
        if snapshot.is_empty() {
            return;
        }

        for handle in &snapshot {
            handle.cancel();
        }
        futures::future::join_all(snapshot.iter().map(TaskHandle::terminated)).await;

        let mut units = self.units();
        for handle in &snapshot {
            units.remove(&handle.id());
        }
    }

    /// Runs `futs` with at most `n` in flight; results come back in input order.
    ///
    /// Failures are returned as values. Units are tracked while they run.
    ///
    /// Fails with [`RuntimeError::InvalidConfig`] if `n == 0`.
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
        let mut pool = TaskPool::tracked(n, self)?;
        for fut in futs {
            pool.submit(fut);
        }
        Ok(pool.gather_all().await)
    }

    /// Like [`gather_with_concurrency`](Self::gather_with_concurrency), but yields the
    /// first failure in input order instead of a list of outcomes.
    ///
    /// Every unit still runs to completion before the outcome is decided.
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
        let results = self.gather_with_concurrency(n, futs).await?;
        Ok(results.into_iter().collect())
    }

    /// Number of live tracked units.
    pub fn len(&self) -> usize {
        self.units().len()
    }

    /// Returns `true` if no unit is tracked.
    pub fn is_empty(&self) -> bool {
        self.units().is_empty()
    }

    /// Returns sorted labels of live tracked units.
    pub fn list(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.units().values().map(TaskHandle::label).collect();
        labels.sort_unstable();
        labels
    }

    /// Returns sorted labels of tracked units that have not reached a terminal state.
    pub(crate) fn stuck(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .units()
            .values()
            .filter(|h| !h.is_terminal())
            .map(TaskHandle::label)
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Token for a new unit: cancelled together with the runtime.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.inner.runtime_token.child_token()
    }

    /// Registers `handle` and spawns `work`; deregisters when `work` ends.
    pub(crate) fn track<T, F>(&self, handle: TaskHandle, work: F) -> JoinHandle<Result<T, TaskError>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let id = handle.id();
        let label = handle.label();
        self.units().insert(id, handle);
        self.inner.bus.publish(
            Event::new(EventKind::UnitSpawned)
                .with_task(label.as_str())
                .with_task_id(id),
        );

        let registry = self.clone();
        tokio::spawn(async move {
            let res = work.await;
            registry.deregister(id, &label, &res);
            res
        })
    }

    fn spawn_unit<T, F, M>(&self, name: Option<Arc<str>>, make: M) -> TaskJoin<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
        M: FnOnce(CancellationToken) -> F,
    {
        let (unit, handle) = Unit::new(name, self.child_token());
        let work = make(unit.token().clone());

        let join = self.track(handle.clone(), async move {
            let res = unit.execute(work).await;
            unit.finish(&res);
            res
        });
        TaskJoin::new(handle, join)
    }

    fn deregister<T>(&self, id: TaskId, label: &str, res: &Result<T, TaskError>) {
        self.units().remove(&id);

        let ev = match res {
            Ok(_) => Event::new(EventKind::UnitCompleted),
            Err(e) if e.is_cancellation() => Event::new(EventKind::UnitCancelled),
            Err(e) => Event::new(EventKind::UnitFailed).with_reason(e.as_message()),
        };
        self.inner.bus.publish(ev.with_task(label).with_task_id(id));
    }

    fn units(&self) -> MutexGuard<'_, HashMap<TaskId, TaskHandle>> {
        self.inner
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{OperationFn, TaskState};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    fn registry() -> (TaskRegistry, tokio::sync::broadcast::Receiver<Event>) {
        let bus = Bus::new(64);
        let rx = bus.subscribe();
        (TaskRegistry::new(bus), rx)
    }

    async fn next_kind(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Event {
        rx.recv().await.expect("event")
    }

    #[tokio::test(start_paused = true)]
    async fn units_are_tracked_until_they_finish() {
        let (reg, mut rx) = registry();

        let join = reg.spawn_named("refresh-cache", async {
            sleep(Duration::from_millis(50)).await;
            Ok::<_, TaskError>(5)
        });
        assert_eq!(reg.list(), vec!["refresh-cache".to_string()]);
        assert_eq!(join.handle().state(), TaskState::Pending);

        assert_eq!(join.join().await, Ok(5));
        let spawned = next_kind(&mut rx).await;
        assert_eq!(spawned.kind, EventKind::UnitSpawned);
        let done = next_kind(&mut rx).await;
        assert_eq!(done.kind, EventKind::UnitCompleted);
        assert_eq!(done.task.as_deref(), Some("refresh-cache"));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn failure_is_reported_on_the_bus() {
        let (reg, mut rx) = registry();

        let join = reg.spawn_named("sync-metadata", async {
            Err::<(), _>(TaskError::fail("connection refused"))
        });
        assert_eq!(join.join().await, Err(TaskError::fail("connection refused")));

        let _spawned = next_kind(&mut rx).await;
        let failed = next_kind(&mut rx).await;
        assert_eq!(failed.kind, EventKind::UnitFailed);
        assert_eq!(failed.task.as_deref(), Some("sync-metadata"));
        assert_eq!(
            failed.reason.as_deref(),
            Some("error: connection refused")
        );
        assert_eq!(reg.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_tracked_drains_registry() {
        let (reg, mut rx) = registry();

        let joins: Vec<_> = (0..3)
            .map(|i| {
                reg.spawn_named(format!("poller-{i}"), async {
                    sleep(Duration::from_secs(3600)).await;
                    Ok::<_, TaskError>(())
                })
            })
            .collect();
        tokio::task::yield_now().await;
        assert_eq!(reg.len(), 3);

        reg.cancel_all_tracked().await;
        assert!(reg.is_empty());

        for join in joins {
            assert_eq!(join.handle().state(), TaskState::Cancelled);
            assert_eq!(join.join().await, Err(TaskError::Canceled));
        }

        let mut cancelled = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::UnitCancelled {
                cancelled += 1;
            }
            assert_ne!(ev.kind, EventKind::UnitFailed);
        }
        assert_eq!(cancelled, 3);
    }

    #[tokio::test]
    async fn operation_units_see_identity_and_name() {
        let (reg, _rx) = registry();
        let op = OperationFn::new("whoami", |_ctx: CancellationToken| async {
            Ok::<_, TaskError>(TaskId::current())
        });

        let join = reg.spawn_operation(op);
        let id = join.id();
        assert_eq!(join.handle().name(), Some("whoami"));
        assert_eq!(join.join().await, Ok(Some(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn gather_preserves_input_order_with_staggered_delays() {
        let (reg, _rx) = registry();
        let delays = [30u64, 10, 20, 5];

        let started = Instant::now();
        let results = reg
            .gather_with_concurrency(
                2,
                delays.iter().map(|&ms| async move {
                    sleep(Duration::from_millis(ms)).await;
                    if ms == 20 {
                        Err(TaskError::fail("slow shard"))
                    } else {
                        Ok(ms)
                    }
                }),
            )
            .await
            .expect("valid concurrency");

        assert_eq!(
            results,
            vec![Ok(30), Ok(10), Err(TaskError::fail("slow shard")), Ok(5)]
        );
        // [30 | 10 → 20] then 5 after the 30ms slot frees: max(30 + 5, 10 + 20) = 35
        assert_eq!(started.elapsed(), Duration::from_millis(35));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn gather_rejects_zero_concurrency() {
        let (reg, _rx) = registry();
        let res = reg
            .gather_with_concurrency(0, vec![async { Ok::<_, TaskError>(()) }])
            .await;
        assert!(matches!(res, Err(RuntimeError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn try_gather_returns_first_failure_in_input_order() {
        let (reg, _rx) = registry();
        let outcome = reg
            .try_gather_with_concurrency(
                3,
                (0..4).map(|i| async move {
                    match i {
                        1 => Err(TaskError::fatal("first")),
                        3 => Err(TaskError::fail("second")),
                        _ => Ok(i),
                    }
                }),
            )
            .await
            .expect("valid concurrency");
        assert_eq!(outcome, Err(TaskError::fatal("first")));
    }
}
