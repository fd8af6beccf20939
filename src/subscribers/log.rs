//! # LogWriter — renders runtime events through `tracing`
//!
//! Level mapping:
//! - `error`: unit failures, exhausted retries, exceeded grace, subscriber panics
//! - `warn`: scheduled retries, timeouts, subscriber overflow
//! - `info`: shutdown progress
//! - `debug`: unit spawn/complete/cancel (cancellation is expected, never an error)
//!
//! The application decides where records go (e.g. `tracing_subscriber::fmt`).

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::UnitSpawned => {
                tracing::debug!(seq = e.seq, task, "unit spawned");
            }
            EventKind::UnitCompleted => {
                tracing::debug!(seq = e.seq, task, "unit completed");
            }
            EventKind::UnitCancelled => {
                tracing::debug!(seq = e.seq, task, "unit cancelled");
            }
            EventKind::UnitFailed => {
                tracing::error!(seq = e.seq, task, reason, "unit failed");
            }
            EventKind::RetryScheduled => {
                tracing::warn!(
                    seq = e.seq,
                    task,
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    reason,
                    "attempt failed, retrying"
                );
            }
            EventKind::RetryExhausted => {
                tracing::error!(
                    seq = e.seq,
                    task,
                    attempts = e.attempt,
                    reason,
                    "retries exhausted"
                );
            }
            EventKind::TimeoutHit => {
                tracing::warn!(seq = e.seq, task, timeout_ms = e.timeout_ms, "deadline exceeded");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(seq = e.seq, "all tracked units stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(seq = e.seq, stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(seq = e.seq, subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(seq = e.seq, subscriber = task, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
