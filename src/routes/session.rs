use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        generation::GenerateQuestionRequest,
        session::{
            AckStatus, AppendQuestionRequest, CreateSessionRequest, HostActionRequest,
            JoinSessionRequest, MutationAck, SessionSummary, SubmitAnswerRequest,
        },
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Session lifecycle and gameplay endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session))
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/answer", post(submit_answer))
        .route("/sessions/{code}/advance", post(advance_question))
        .route("/sessions/{code}/restart", post(restart_session))
        .route("/sessions/{code}/questions", post(append_question))
        .route("/sessions/{code}/questions/generate", post(generate_question))
        .route("/sessions/{code}/reconnect", post(reconnect_session))
}

/// Open a new session; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = MutationAck),
        (status = 202, description = "Storage degraded; creation queued", body = MutationAck),
        (status = 503, description = "No free session code available")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::create_session(&state, payload.participant.into()).await?;
    let status = match ack.status {
        AckStatus::Applied => StatusCode::CREATED,
        AckStatus::Queued => StatusCode::ACCEPTED,
    };
    Ok((status, Json(ack)))
}

/// Fetch the current session document.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSummary),
        (status = 404, description = "Unknown session code")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::get_session(&state, &code).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// Join a session as a player.
#[utoipa::path(
    post,
    path = "/sessions/{code}/join",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Joined (or already a member)", body = MutationAck),
        (status = 202, description = "Storage degraded; join queued", body = MutationAck),
        (status = 404, description = "Unknown session code")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::join_session(&state, &code, payload.participant.into()).await?;
    Ok(ack_response(ack))
}

/// Record the caller's answer for the current question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/answer",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded (or already recorded)", body = MutationAck),
        (status = 202, description = "Storage degraded; answer queued", body = MutationAck),
        (status = 401, description = "Hosts may not submit answers"),
        (status = 409, description = "The quiz has ended")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::submit_answer(
        &state,
        &code,
        payload.participant.into(),
        payload.answer,
    )
    .await?;
    Ok(ack_response(ack))
}

/// Advance to the next question (host only).
#[utoipa::path(
    post,
    path = "/sessions/{code}/advance",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Advanced or quiz ended", body = MutationAck),
        (status = 202, description = "Storage degraded; advance queued", body = MutationAck),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn advance_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<HostActionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::advance_question(&state, &code, payload.participant.into()).await?;
    Ok(ack_response(ack))
}

/// Restart the session with a fresh question set (host only).
#[utoipa::path(
    post,
    path = "/sessions/{code}/restart",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Session restarted", body = MutationAck),
        (status = 202, description = "Storage degraded; restart queued", body = MutationAck),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn restart_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<HostActionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::restart_session(&state, &code, payload.participant.into()).await?;
    Ok(ack_response(ack))
}

/// Append a host-supplied question to the session.
#[utoipa::path(
    post,
    path = "/sessions/{code}/questions",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = AppendQuestionRequest,
    responses(
        (status = 200, description = "Question appended", body = MutationAck),
        (status = 202, description = "Storage degraded; append queued", body = MutationAck),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn append_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<AppendQuestionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::append_question(
        &state,
        &code,
        payload.participant.into(),
        payload.question.into(),
    )
    .await?;
    Ok(ack_response(ack))
}

/// Generate a question through the configured backend and append it.
#[utoipa::path(
    post,
    path = "/sessions/{code}/questions/generate",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = GenerateQuestionRequest,
    responses(
        (status = 200, description = "Generated question appended", body = MutationAck),
        (status = 401, description = "Caller is not the host"),
        (status = 503, description = "No generation backend, or storage degraded")
    )
)]
pub async fn generate_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<GenerateQuestionRequest>>,
) -> Result<(StatusCode, Json<MutationAck>), AppError> {
    let ack = session_service::generate_and_append(
        &state,
        &code,
        payload.participant.into(),
        payload.topic,
    )
    .await?;
    Ok(ack_response(ack))
}

/// Host-only reconnect returning the authoritative session document.
#[utoipa::path(
    post,
    path = "/sessions/{code}/reconnect",
    tag = "sessions",
    params(("code" = String, Path, description = "Four-letter session code")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Authoritative snapshot", body = SessionSummary),
        (status = 401, description = "Caller is not the host"),
        (status = 503, description = "Storage degraded")
    )
)]
pub async fn reconnect_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<HostActionRequest>>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::reconnect(&state, &code, payload.participant.into()).await?;
    Ok(Json(SessionSummary::from(&session)))
}

fn ack_response(ack: MutationAck) -> (StatusCode, Json<MutationAck>) {
    let status = match ack.status {
        AckStatus::Applied => StatusCode::OK,
        AckStatus::Queued => StatusCode::ACCEPTED,
    };
    (status, Json(ack))
}
