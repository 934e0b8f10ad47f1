use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::Handshake, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Four-letter session code")),
    responses(
        (status = 200, description = "Session snapshot stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session code")
    )
)]
/// Stream full session snapshots to a connected client.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, snapshot) = sse_service::subscribe_session(&state, &code).await?;
    info!(code = %snapshot.code, "new session SSE connection");

    let handshake = Handshake {
        code: snapshot.code.clone(),
        message: "session stream connected".into(),
        degraded: state.is_degraded(),
    };
    Ok(sse_service::to_sse_stream(receiver, handshake, snapshot))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{code}/events", get(session_stream))
}
