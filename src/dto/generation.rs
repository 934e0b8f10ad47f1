use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::session::ParticipantInput;

/// Payload asking the backend to generate and append a fresh question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GenerateQuestionRequest {
    #[validate(nested)]
    pub participant: ParticipantInput,
    /// Optional topic hint passed to the generation backend.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Structured question returned by the generation backend.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// Free-text varietal description returned to the client.
#[derive(Debug, Serialize, ToSchema)]
pub struct VarietalDescription {
    /// Varietal the description is about.
    pub varietal: String,
    /// Generated description text.
    pub description: String,
}
