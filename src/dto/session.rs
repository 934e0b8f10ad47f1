use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{format_system_time, validation::validate_question_options},
    state::session::{GameSession, PlayerState, Question, SessionContext},
};

/// Identity of the caller issuing a request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ParticipantInput {
    /// Stable client identity, opaque to the server.
    #[validate(length(min = 1, message = "identity must not be empty"))]
    pub identity: String,
    /// Optional display name shown to other participants.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<ParticipantInput> for SessionContext {
    fn from(value: ParticipantInput) -> Self {
        match value.display_name {
            Some(name) => SessionContext::named(value.identity, name),
            None => SessionContext::anonymous(value.identity),
        }
    }
}

/// Payload used to open a brand-new quiz session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
}

/// Payload used to join an existing session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
}

/// Payload recording a player's answer for the current question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
    /// Option text that was selected.
    #[validate(length(min = 1, message = "answer must not be empty"))]
    pub answer: String,
}

/// Payload for host-only operations (advance, restart, reconnect).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HostActionRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
}

/// Incoming question definition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionInput {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.question.trim().is_empty() {
            let mut err = validator::ValidationError::new("question_text");
            err.message = Some("Question text must not be empty".into());
            errors.add("question", err);
        }

        if let Err(e) = validate_question_options(&self.options, &self.correct_answer) {
            errors.add("options", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<QuestionInput> for Question {
    fn from(value: QuestionInput) -> Self {
        Self {
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

/// Payload appending one question to a running session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AppendQuestionRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
    #[validate(nested)]
    pub question: QuestionInput,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a question exposed to REST/SSE clients.
pub struct QuestionSummary {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        Self {
            question: question.question.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a player exposed to REST/SSE clients.
pub struct PlayerSummary {
    pub id: String,
    pub user_name: String,
    pub score: u32,
    pub selected_answer: Option<String>,
    pub feedback: Option<String>,
}

impl From<&PlayerState> for PlayerSummary {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.clone(),
            user_name: player.user_name.clone(),
            score: player.score,
            selected_answer: player.selected_answer.clone(),
            feedback: player.feedback.clone(),
        }
    }
}

/// Full session snapshot returned by REST reads and carried on the SSE stream.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub code: String,
    pub host_id: String,
    pub host_name: String,
    pub questions: Vec<QuestionSummary>,
    pub current_question_index: usize,
    pub quiz_ended: bool,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
    pub created_at: String,
    pub last_activity: String,
}

impl From<&GameSession> for SessionSummary {
    fn from(session: &GameSession) -> Self {
        Self {
            code: session.code.clone(),
            host_id: session.host_id.clone(),
            host_name: session.host_name.clone(),
            questions: session.questions.iter().map(Into::into).collect(),
            current_question_index: session.current_question_index,
            quiz_ended: session.quiz_ended,
            players: session.players.values().map(Into::into).collect(),
            created_at: format_system_time(session.created_at),
            last_activity: format_system_time(session.last_activity),
        }
    }
}

/// Whether a mutation was written to the store or parked in the offline queue.
#[derive(Clone, Copy, Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// The mutation landed in the store and was broadcast.
    Applied,
    /// Storage is unreachable; the mutation waits in the offline queue.
    Queued,
}

/// Acknowledgement returned by every mutating session endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct MutationAck {
    pub status: AckStatus,
    /// Idempotency key of the queued operation, when status is `queued`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub key: Option<Uuid>,
    /// Authoritative snapshot after the mutation, when status is `applied`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSummary>,
}

impl MutationAck {
    /// Acknowledge a mutation that reached the store.
    pub fn applied(session: &GameSession) -> Self {
        Self {
            status: AckStatus::Applied,
            key: None,
            session: Some(session.into()),
        }
    }

    /// Acknowledge a mutation captured for later replay.
    pub fn queued(key: Uuid) -> Self {
        Self {
            status: AckStatus::Queued,
            key: Some(key),
            session: None,
        }
    }
}
