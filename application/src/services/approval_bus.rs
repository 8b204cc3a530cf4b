//! Internal approval bus.
//!
//! Delegated agents have no direct user stream. Their approval requests and
//! resolutions are published here, keyed by the owning stream id, so that
//! the outer layer holding the user connection can surface them.

use relay_domain::ApprovalRequest;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalBusEvent {
    Requested {
        stream_id: String,
        request: ApprovalRequest,
    },
    Resolved {
        stream_id: String,
        call_id: String,
        approved: bool,
    },
}

impl ApprovalBusEvent {
    pub fn stream_id(&self) -> &str {
        match self {
            ApprovalBusEvent::Requested { stream_id, .. }
            | ApprovalBusEvent::Resolved { stream_id, .. } => stream_id,
        }
    }
}

/// Broadcast channels keyed by stream id.
pub struct ApprovalBus {
    channels: Mutex<HashMap<String, broadcast::Sender<ApprovalBusEvent>>>,
    capacity: usize,
}

impl Default for ApprovalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ApprovalBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to events for `stream_id`.
    pub fn subscribe(&self, stream_id: &str) -> broadcast::Receiver<ApprovalBusEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        // Streams whose receivers are all gone
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(stream_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: ApprovalBusEvent) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let stream_id = event.stream_id().to_string();
        let Some(sender) = channels.get(&stream_id) else {
            debug!(stream_id = %stream_id, "No approval bus subscribers");
            return 0;
        };
        match sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                // Every receiver is gone.
                channels.remove(&stream_id);
                0
            }
        }
    }
}
