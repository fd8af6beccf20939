use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    bridge::ExecutorBridge,
    core::{Config, TaskRegistry, runtime::Runtime},
    error::RuntimeError,
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Runtime`] with optional subscribers.
pub struct RuntimeBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (unit lifecycle, retries, timeouts,
    /// shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Validates the configuration and initializes all runtime components:
    /// - event bus and subscriber listener
    /// - registry of tracked units
    /// - blocking I/O and CPU pools
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        self.cfg.validate()?;

        let mut subscribers = self.subscribers;
        #[cfg(feature = "logging")]
        if self.cfg.log_events {
            subscribers.push(Arc::new(crate::subscribers::LogWriter::new()));
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();
        let listener_stop = CancellationToken::new();

        let subs = SubscriberSet::new(subscribers, bus.clone());
        let listener = subscriber_listener(&bus, subs, listener_stop.clone());

        let registry = TaskRegistry::with_token(bus.clone(), runtime_token.clone());
        let bridge = ExecutorBridge::new(self.cfg.io_workers, self.cfg.cpu_workers)?;

        Ok(Runtime::new_internal(
            self.cfg,
            bus,
            registry,
            bridge,
            runtime_token,
            listener_stop,
            Mutex::new(Some(listener)),
        ))
    }
}

/// Forwards bus events to the subscriber set until `stop` fires, then drains what
/// is already buffered and waits for subscriber workers to finish.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, stop: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => {
                        set.emit(&Event::subscriber_overflow("listener", "lagged"));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}
