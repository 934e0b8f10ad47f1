use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Per-session broadcast hubs used by the snapshot SSE streams.
///
/// A channel is created lazily on the first subscription or broadcast for a
/// code and removed when the session is closed.
pub struct SessionHub {
    channels: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl SessionHub {
    /// Build the hub with a per-session channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber for the given session code.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.sender(code).subscribe()
    }

    /// Send an event to all current subscribers of a session, ignoring
    /// delivery errors.
    pub fn broadcast(&self, code: &str, event: ServerEvent) {
        let _ = self.sender(code).send(event);
    }

    /// Send a terminal event and drop the session's channel.
    ///
    /// Subscribers observe the event followed by a closed stream.
    pub fn close(&self, code: &str, event: ServerEvent) {
        if let Some((_, sender)) = self.channels.remove(code) {
            let _ = sender.send(event);
        }
    }

    fn sender(&self, code: &str) -> broadcast::Sender<ServerEvent> {
        self.channels
            .entry(code.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}
