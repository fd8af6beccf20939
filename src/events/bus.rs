//! # Event bus.
//!
//! [`Bus`] fans events from the registry, the guards and the runtime's shutdown
//! path out to whoever subscribed. It wraps [`tokio::sync::broadcast`]:
//!
//! ```text
//!   TaskRegistry ──┐
//!   Retry        ──┤
//!   TimeoutGuard ──┼──► Bus ──► Runtime listener ──► SubscriberSet
//!   Runtime      ──┘
//! ```
//!
//! Publishing never waits. The ring buffer holds the last `capacity` events;
//! a receiver that falls further behind sees `RecvError::Lagged(n)` and resumes
//! from the oldest retained event. Events published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` undelivered events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev` to current receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
