use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Vino Trivia backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::session_stream,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::submit_answer,
        crate::routes::session::advance_question,
        crate::routes::session::restart_session,
        crate::routes::session::append_question,
        crate::routes::session::generate_question,
        crate::routes::session::reconnect_session,
        crate::routes::generation::varietal_description,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::ParticipantInput,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::HostActionRequest,
            crate::dto::session::QuestionInput,
            crate::dto::session::AppendQuestionRequest,
            crate::dto::session::QuestionSummary,
            crate::dto::session::PlayerSummary,
            crate::dto::session::SessionSummary,
            crate::dto::session::AckStatus,
            crate::dto::session::MutationAck,
            crate::dto::sse::Handshake,
            crate::dto::sse::SessionSnapshotEvent,
            crate::dto::sse::SessionClosedEvent,
            crate::dto::generation::GenerateQuestionRequest,
            crate::dto::generation::GeneratedQuestion,
            crate::dto::generation::VarietalDescription,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle and gameplay"),
        (name = "sse", description = "Server-sent session snapshot streams"),
        (name = "generation", description = "Generated quiz content"),
    )
)]
pub struct ApiDoc;
