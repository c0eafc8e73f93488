use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Fan-out point of the live SSE stream. Every broadcast frame gets the next sequence number.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
    sequence: AtomicU64,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Number of connected streams.
    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sequence number of the most recent broadcast, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Number `event` and send it to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let _ = self.sender.send(event.with_sequence(sequence));
        sequence
    }

    /// Serialise `payload` as the data of a `name` event and broadcast it.
    pub fn broadcast_json<T: Serialize>(&self, name: &'static str, payload: &T) {
        match ServerEvent::json(name, payload) {
            Ok(event) => {
                self.broadcast(event);
            }
            Err(err) => warn!(event = name, error = %err, "failed to serialise SSE payload"),
        }
    }
}
