//! # Bounded task pool.
//!
//! [`TaskPool`] runs submitted units concurrently with at most `capacity` of them
//! running at once. Every unit is spawned immediately and waits in `Pending` until
//! the admission semaphore lets it in.
//!
//! ## Unit lifecycle
//! ```text
//! submit ──► Unit::new (Pending) ──► ledger.pending
//!              └─► tokio::spawn (or registry.track for tracked pools)
//!                    └─► select! { token.cancelled() → Cancelled
//!                                  semaphore.acquire_owned() → permit }
//!                          ├─► ledger: pending → running
//!                          ├─► execute (Running, identity scope, catch_unwind)
//!                          ├─► callbacks (still holding the permit)
//!                          ├─► ledger: running → completed
//!                          ├─► handle state terminal
//!                          └─► drop permit ─► next pending unit admitted
//! ```
//!
//! ## Rules
//! - `running_count() <= capacity()` at all times.
//! - Results are gathered in submission order regardless of finish order.
//! - A failing or panicking unit never disturbs its siblings.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::TaskRegistry;
use crate::error::{RuntimeError, TaskError};
use crate::pool::{Callbacks, ledger::Ledger};
use crate::tasks::{Operation, TaskHandle, join_unit, unit::Unit};

/// Where pool units are spawned.
#[derive(Debug)]
enum Spawner {
    Detached,
    Tracked(TaskRegistry),
}

impl Spawner {
    fn spawn<T, F>(&self, handle: TaskHandle, work: F) -> JoinHandle<Result<T, TaskError>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        match self {
            Spawner::Detached => tokio::spawn(work),
            Spawner::Tracked(registry) => registry.track(handle, work),
        }
    }

    fn token(&self) -> CancellationToken {
        match self {
            Spawner::Detached => CancellationToken::new(),
            Spawner::Tracked(registry) => registry.child_token(),
        }
    }
}

/// Pool running at most `capacity` units concurrently.
///
/// ```rust
/// use std::time::Duration;
/// use taskgate::{TaskError, TaskPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskgate::RuntimeError> {
/// let mut pool = TaskPool::new(2)?;
/// for page in 0..5u32 {
///     pool.submit(async move {
///         tokio::time::sleep(Duration::from_millis(1)).await;
///         Ok::<_, TaskError>(page * 10)
///     });
/// }
///
/// let results = pool.gather_all().await;
/// assert_eq!(results.len(), 5);
/// assert_eq!(results[4], Ok(40));
/// assert!(pool.peak_running() <= 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaskPool<T> {
    capacity: usize,
    admission: Arc<Semaphore>,
    ledger: Arc<Mutex<Ledger>>,
    units: Vec<(TaskHandle, JoinHandle<Result<T, TaskError>>)>,
    spawner: Spawner,
}

impl<T: Send + 'static> TaskPool<T> {
    /// Creates a pool whose units are not tracked by any registry.
    ///
    /// Fails with [`RuntimeError::InvalidConfig`] if `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self, RuntimeError> {
        Self::build(capacity, Spawner::Detached)
    }

    /// Creates a pool whose units are tracked by `registry` (and cancelled with it).
    pub fn tracked(capacity: usize, registry: &TaskRegistry) -> Result<Self, RuntimeError> {
        Self::build(capacity, Spawner::Tracked(registry.clone()))
    }

    fn build(capacity: usize, spawner: Spawner) -> Result<Self, RuntimeError> {
        if capacity == 0 {
            return Err(RuntimeError::invalid("pool capacity must be >= 1"));
        }
        Ok(Self {
            capacity,
            admission: Arc::new(Semaphore::new(capacity)),
            ledger: Arc::new(Mutex::new(Ledger::default())),
            units: Vec::new(),
            spawner,
        })
    }

    /// Submits `fut` as an unnamed unit.
    pub fn submit<F>(&mut self, fut: F) -> TaskHandle
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.submit_unit(None, move |_token| fut, Callbacks::default())
    }

    /// Submits `fut` as a unit labelled `name`.
    pub fn submit_named<F>(&mut self, name: impl Into<Arc<str>>, fut: F) -> TaskHandle
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.submit_unit(Some(name.into()), move |_token| fut, Callbacks::default())
    }

    /// Submits `fut` with completion hooks.
    pub fn submit_with<F>(
        &mut self,
        name: impl Into<Arc<str>>,
        fut: F,
        callbacks: Callbacks<T>,
    ) -> TaskHandle
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.submit_unit(Some(name.into()), move |_token| fut, callbacks)
    }

    /// Submits an [`Operation`]; it receives the unit's cancellation token.
    pub fn submit_operation<O>(&mut self, op: O) -> TaskHandle
    where
        O: Operation<Output = T>,
    {
        let name: Arc<str> = Arc::from(op.name());
        self.submit_unit(
            Some(name),
            move |token| async move { op.call(token).await },
            Callbacks::default(),
        )
    }

    /// Waits for every submitted unit; returns outcomes in submission order.
    ///
    /// The pool can be reused afterwards.
    pub async fn gather_all(&mut self) -> Vec<Result<T, TaskError>> {
        let units = std::mem::take(&mut self.units);
        let mut results = Vec::with_capacity(units.len());
        for (_handle, join) in units {
            results.push(join_unit(join).await);
        }
        results
    }

    /// Requests cancellation of every pending and running unit without waiting.
    ///
    /// Cancelled units still appear in a later [`gather_all`](Self::gather_all) as
    /// [`TaskError::Canceled`].
    pub fn cancel_all(&mut self) {
        for (handle, _) in &self.units {
            handle.cancel();
        }
        self.ledger().cancel_all();
    }

    /// Handles of units not yet gathered, in submission order.
    pub fn handles(&self) -> Vec<TaskHandle> {
        self.units.iter().map(|(h, _)| h.clone()).collect()
    }

    /// Units waiting for admission.
    pub fn pending_count(&self) -> usize {
        self.ledger().pending()
    }

    /// Units currently admitted.
    pub fn running_count(&self) -> usize {
        self.ledger().running()
    }

    /// Units finished or cancelled since the pool was created.
    pub fn completed_count(&self) -> usize {
        self.ledger().completed()
    }

    /// Highest `running_count` observed.
    pub fn peak_running(&self) -> usize {
        self.ledger().peak_running()
    }

    /// Maximum number of concurrently running units.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn submit_unit<F, M>(&mut self, name: Option<Arc<str>>, make: M, callbacks: Callbacks<T>) -> TaskHandle
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
        M: FnOnce(CancellationToken) -> F,
    {
        let (unit, handle) = Unit::new(name, self.spawner.token());
        let work = make(unit.token().clone());
        self.ledger().submitted(unit.id());

        let admission = self.admission.clone();
        let ledger = self.ledger.clone();
        let run = async move {
            let Some(permit) = admit(unit.token(), admission).await else {
                lock(&ledger).finished(unit.id());
                let res: Result<T, TaskError> = Err(TaskError::Canceled);
                unit.finish(&res);
                return res;
            };

            lock(&ledger).admitted(unit.id());
            let res = callbacks.dispatch(unit.execute(work).await);
            lock(&ledger).finished(unit.id());
            // Terminal before the slot frees, so observers never see N+1 running.
            unit.finish(&res);
            drop(permit);
            res
        };

        let join = self.spawner.spawn(handle.clone(), run);
        self.units.push((handle.clone(), join));
        handle
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        lock(&self.ledger)
    }
}

/// Waits for a slot; gives up when the unit is cancelled first.
async fn admit(token: &CancellationToken, admission: Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        permit = admission.acquire_owned() => permit.ok(),
    }
}

fn lock(ledger: &Mutex<Ledger>) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Bus, EventKind};
    use crate::tasks::{OperationFn, TaskState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    #[tokio::test(start_paused = true)]
    async fn two_slots_five_units_take_three_rounds() {
        let mut pool = TaskPool::new(2).expect("pool");
        for i in 0..5 {
            pool.submit(async move {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, TaskError>(i)
            });
        }
        assert_eq!(pool.pending_count(), 5);

        let started = Instant::now();
        let results = pool.gather_all().await;

        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(results, vec![Ok(0), Ok(1), Ok(2), Ok(3), Ok(4)]);
        assert_eq!(pool.peak_running(), 2);
        assert_eq!(pool.completed_count(), 5);
        assert_eq!((pool.pending_count(), pool.running_count()), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn running_never_exceeds_capacity() {
        let mut pool = TaskPool::new(3).expect("pool");
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..20u64 {
            let (inside, peak) = (inside.clone(), peak.clone());
            pool.submit(async move {
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5 + i % 7)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            });
        }
        let results = pool.gather_all().await;

        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(pool.peak_running() <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slot_frees_only_after_previous_unit_is_terminal() {
        let mut pool = TaskPool::new(1).expect("pool");
        let mut prev = pool.submit(async { Ok::<_, TaskError>(true) });
        for _ in 0..50 {
            let before = prev.clone();
            prev = pool.submit(async move {
                tokio::task::yield_now().await;
                Ok(before.is_terminal())
            });
        }

        let results = pool.gather_all().await;
        assert_eq!(results.len(), 51);
        assert!(results.into_iter().all(|r| r == Ok(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_values_and_siblings_survive() {
        let mut pool = TaskPool::new(2).expect("pool");
        pool.submit(async { Ok::<_, TaskError>("a") });
        pool.submit(async { Err(TaskError::fail("b failed")) });
        pool.submit(async {
            if true {
                panic!("c panicked");
            }
            Ok("c")
        });
        pool.submit(async { Ok("d") });

        let results = pool.gather_all().await;
        assert_eq!(results[0], Ok("a"));
        assert_eq!(results[1], Err(TaskError::fail("b failed")));
        assert_eq!(
            results[2],
            Err(TaskError::Panicked {
                reason: "c panicked".into()
            })
        );
        assert_eq!(results[3], Ok("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_fire_once_per_outcome() {
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let mut pool = TaskPool::new(4).expect("pool");

        for i in 0..6u32 {
            let (s, f) = (successes.clone(), failures.clone());
            pool.submit_with(
                format!("item-{i}"),
                async move {
                    if i % 3 == 0 {
                        Err(TaskError::fail("odd one out"))
                    } else {
                        Ok(i)
                    }
                },
                Callbacks::new()
                    .on_success(move |_| {
                        s.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_failure(move |_| {
                        f.fetch_add(1, Ordering::SeqCst);
                    }),
            );
        }
        pool.gather_all().await;

        assert_eq!(successes.load(Ordering::SeqCst), 4);
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_pending_and_running_units() {
        let mut pool = TaskPool::new(1).expect("pool");
        let slow = || async {
            sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        };
        let first = pool.submit_named("first", slow());
        let second = pool.submit_named("second", slow());

        sleep(Duration::from_millis(1)).await;
        assert_eq!(first.state(), TaskState::Running);
        assert_eq!(second.state(), TaskState::Pending);
        assert_eq!((pool.running_count(), pool.pending_count()), (1, 1));

        pool.cancel_all();
        assert_eq!(pool.completed_count(), 2);
        assert!(pool.handles().iter().all(TaskHandle::is_cancel_requested));
        assert_eq!((pool.running_count(), pool.pending_count()), (0, 0));

        let results = pool.gather_all().await;
        assert_eq!(results, vec![Err(TaskError::Canceled), Err(TaskError::Canceled)]);
        assert_eq!(first.state(), TaskState::Cancelled);
        assert_eq!(second.state(), TaskState::Cancelled);
        assert_eq!(pool.completed_count(), 2);
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        assert!(TaskPool::<()>::new(0).is_err());
    }

    #[tokio::test]
    async fn tracked_pool_registers_units_and_runs_operations() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let registry = TaskRegistry::new(bus);
        let mut pool = TaskPool::tracked(2, &registry).expect("pool");

        pool.submit_operation(OperationFn::new("scan", |_ctx: CancellationToken| async {
            Ok::<_, TaskError>(7)
        }));
        assert_eq!(registry.list(), vec!["scan".to_string()]);

        assert_eq!(pool.gather_all().await, vec![Ok(7)]);
        assert!(registry.is_empty());
        assert_eq!(rx.recv().await.expect("event").kind, EventKind::UnitSpawned);
        assert_eq!(rx.recv().await.expect("event").kind, EventKind::UnitCompleted);
    }
}
