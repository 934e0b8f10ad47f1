use tracing::warn;

use crate::{
    dto::sse::{ServerEvent, SessionClosedEvent, SessionSnapshotEvent},
    state::{SharedState, session::GameSession},
};

/// Event name carried by full-snapshot broadcasts.
pub const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";
/// Event name carried by the terminal event of a session stream.
pub const EVENT_SESSION_CLOSED: &str = "session.closed";
/// Event name of the metadata event opening every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";

/// Broadcast the authoritative snapshot of a session to its subscribers.
///
/// Every state change is published as the complete document; subscribers
/// replace their local copy instead of patching it.
pub fn broadcast_snapshot(state: &SharedState, session: &GameSession) {
    let payload = SessionSnapshotEvent(session.into());
    match ServerEvent::json(Some(EVENT_SESSION_SNAPSHOT.to_string()), &payload) {
        Ok(event) => state.hub().broadcast(&session.code, event),
        Err(err) => warn!(code = %session.code, error = %err, "failed to serialize session snapshot"),
    }
}

/// Send the terminal event for a session and tear its channel down.
pub fn broadcast_session_closed(state: &SharedState, code: &str, reason: &str) {
    let payload = SessionClosedEvent {
        code: code.to_owned(),
        reason: reason.to_owned(),
    };
    match ServerEvent::json(Some(EVENT_SESSION_CLOSED.to_string()), &payload) {
        Ok(event) => state.hub().close(code, event),
        Err(err) => warn!(code, error = %err, "failed to serialize session closed event"),
    }
}
