use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::{
    dto::sse::{Handshake, ServerEvent, SessionSnapshotEvent},
    error::ServiceError,
    services::{
        session_service,
        sse_events::{EVENT_HANDSHAKE, EVENT_SESSION_SNAPSHOT},
    },
    state::{SharedState, session::GameSession},
};

/// Subscribe to a session's snapshot stream.
///
/// Returns the broadcast receiver together with the snapshot the stream
/// opens with. While degraded, the last snapshot this process observed is
/// served so reconnecting clients still get a starting point.
pub async fn subscribe_session(
    state: &SharedState,
    code: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, GameSession), ServiceError> {
    let code = session_service::checked_code(code)?;

    let session = match state.session_store().await {
        Some(store) => match store.find_session(code.clone()).await {
            Ok(Some(entity)) => GameSession::from(entity),
            Ok(None) => {
                return Err(ServiceError::NotFound(format!(
                    "no session with code {code}"
                )));
            }
            Err(err) => {
                warn!(code, error = %err, "store read failed; serving last known snapshot");
                state
                    .last_snapshot(&code)
                    .ok_or(ServiceError::Unavailable(err))?
            }
        },
        None => state.last_snapshot(&code).ok_or(ServiceError::Degraded)?,
    };

    state.remember_snapshot(session.clone());
    Ok((state.hub().subscribe(&code), session))
}

/// Convert a broadcast receiver into an SSE response, sending the handshake
/// and initial snapshot first, then forwarding events until the client
/// disconnects.
///
/// Takes the snapshot by value; the returned stream must not capture any
/// request-local borrow.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: Handshake,
    snapshot: GameSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    let code = snapshot.code.clone();
    let initial = initial_events(&handshake, &snapshot);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        for event in initial {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(code, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn initial_events(handshake: &Handshake, snapshot: &GameSession) -> Vec<Event> {
    let mut events = Vec::with_capacity(2);

    match serde_json::to_string(handshake) {
        Ok(data) => events.push(Event::default().event(EVENT_HANDSHAKE).data(data)),
        Err(err) => warn!(error = %err, "failed to serialize SSE handshake"),
    }

    let payload = SessionSnapshotEvent(snapshot.into());
    match serde_json::to_string(&payload) {
        Ok(data) => events.push(Event::default().event(EVENT_SESSION_SNAPSHOT).data(data)),
        Err(err) => warn!(error = %err, "failed to serialize initial snapshot"),
    }

    events
}
