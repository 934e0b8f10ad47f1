use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Question entry persisted inside a session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Prompt text shown to every participant.
    pub question: String,
    /// Exactly four distinct option strings.
    pub options: Vec<String>,
    /// The correct option; always equals one element of `options`.
    pub correct_answer: String,
    /// Supplementary text shown after answering.
    pub explanation: String,
}

/// Representation of a player stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Client identity the player joined with.
    pub id: String,
    /// Display name captured at join time.
    pub user_name: String,
    /// Current score for the player.
    pub score: u32,
    /// Selection for the current question, if any.
    pub selected_answer: Option<String>,
    /// Feedback label for the current question, if any.
    pub feedback: Option<String>,
}

/// Aggregate session entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Four uppercase letters; primary key of the session.
    pub code: String,
    /// Identity of the creating client; immutable after creation.
    pub host_id: String,
    /// Display name of the host captured at creation.
    pub host_name: String,
    /// Ordered question sequence.
    pub questions: Vec<QuestionEntity>,
    /// 0-based index of the question currently in play.
    pub current_question_index: usize,
    /// Whether the quiz has ended.
    pub quiz_ended: bool,
    /// Participating players in join order.
    pub players: Vec<PlayerEntity>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the session was mutated; drives the retention sweep.
    pub last_activity: SystemTime,
}
