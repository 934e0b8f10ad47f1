use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::session::SessionSummary;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Session code the stream is bound to.
    pub code: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the authoritative session state changes.
///
/// Always a full snapshot; subscribers replace their local copy wholesale.
pub struct SessionSnapshotEvent(pub SessionSummary);

#[derive(Debug, Serialize, ToSchema)]
/// Terminal event sent before a session's stream is closed.
pub struct SessionClosedEvent {
    pub code: String,
    /// Why the session went away ("expired" or "deleted").
    pub reason: String,
}
