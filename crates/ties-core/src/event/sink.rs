//! Event sinks and the notifier that fans events out to them.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::RelationshipEvent;

/// Default bounded capacity of the in-process broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Failure delivering an event to one sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("journal write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A consumer of committed relationship events.
pub trait EventSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if delivery failed. The notifier logs it and
    /// moves on.
    fn publish(&self, event: &RelationshipEvent) -> Result<(), SinkError>;
}

/// Fans events out to registered sinks, swallowing (and logging) failures.
#[derive(Clone, Default)]
pub struct EventNotifier {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|sink| sink.name()))
            .finish()
    }
}

impl EventNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Publish `events` in order to every sink.
    ///
    /// Returns the number of failed deliveries, for callers that want to
    /// surface them; the mutation that produced the events is unaffected.
    pub fn publish(&self, events: &[RelationshipEvent]) -> usize {
        let mut failures = 0;
        for event in events {
            for sink in &self.sinks {
                if let Err(err) = sink.publish(event) {
                    failures += 1;
                    warn!(
                        sink = sink.name(),
                        kind = %event.kind,
                        actor = %event.actor,
                        target = %event.target,
                        error = %err,
                        "event delivery failed"
                    );
                }
            }
        }
        failures
    }
}

/// In-process fan-out over a bounded broadcast channel.
///
/// Slow subscribers lag and lose the oldest events instead of blocking the
/// publisher. Publishing with no subscribers is not a failure.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<RelationshipEvent>,
}

impl BroadcastSink {
    /// Create a channel holding up to `capacity` undelivered events per
    /// subscriber. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelationshipEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&self, event: &RelationshipEvent) -> Result<(), SinkError> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(receivers, kind = %event.kind, "broadcast event"),
            Err(_) => debug!(kind = %event.kind, "no subscribers for event"),
        }
        Ok(())
    }
}

/// Records every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RelationshipEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<RelationshipEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything published so far.
    pub fn drain(&self) -> Vec<RelationshipEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn publish(&self, event: &RelationshipEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
