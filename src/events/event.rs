//! # Runtime events emitted by the registry, guards and runtime.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Unit events**: tracked units spawned, completed, failed, cancelled
//! - **Guard events**: retry scheduled/exhausted, timeout hit
//! - **Shutdown events**: shutdown requested, drained within grace, grace exceeded
//! - **Subscriber events**: subscriber overflow and panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit label,
//! reasons, attempts, and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_task("fetch-sessions")
//!     .with_reason("connection reset")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(200));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.task.as_deref(), Some("fetch-sessions"));
//! assert_eq!(ev.delay_ms, Some(200));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// All tracked units reached a terminal state within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tracked units did not stop in time.
    ///
    /// Sets:
    /// - `reason`: labels of the stuck units
    GraceExceeded,

    // === Tracked unit events ===
    /// Unit was spawned and registered.
    ///
    /// Sets:
    /// - `task`: unit label
    /// - `task_id`: unit identity
    UnitSpawned,

    /// Unit finished successfully and was deregistered.
    UnitCompleted,

    /// Unit finished with an unexpected failure and was deregistered.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: failure message
    UnitFailed,

    /// Unit observed a cancellation request and was deregistered.
    UnitCancelled,

    // === Guard events ===
    /// Attempt failed with a retryable error; next attempt scheduled.
    ///
    /// Sets:
    /// - `task`: operation name
    /// - `attempt`: the attempt that failed (1-based)
    /// - `delay_ms`: wait before the next attempt
    /// - `reason`: failure summary
    RetryScheduled,

    /// Final attempt failed; the last error is returned unchanged.
    ///
    /// Sets:
    /// - `task`: operation name
    /// - `attempt`: number of attempts made
    /// - `reason`: failure summary
    RetryExhausted,

    /// Operation exceeded its deadline and was cancelled.
    ///
    /// Sets:
    /// - `task`: operation name
    /// - `timeout_ms`: configured deadline
    TimeoutHit,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Unit/operation label, if applicable.
    pub task: Option<Arc<str>>,
    /// Unit identity, if applicable.
    pub task_id: Option<TaskId>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            timeout_ms: None,
            delay_ms: None,
            reason: None,
            attempt: None,
            task: None,
            task_id: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a unit/operation label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a unit identity.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
