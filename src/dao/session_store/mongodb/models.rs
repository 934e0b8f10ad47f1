use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, QuestionEntity, SessionEntity};

/// Session document as stored in the `sessions` collection.
///
/// Player records live in their own collection so that per-player updates do
/// not rewrite the session document; only the join order is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub code: String,
    pub host_id: String,
    pub host_name: String,
    pub questions: Vec<QuestionEntity>,
    pub current_question_index: usize,
    pub quiz_ended: bool,
    pub player_ids: Vec<String>,
    pub created_at: DateTime,
    pub last_activity: DateTime,
}

/// Player record keyed by `(code, player_id)` in the `players` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    pub code: String,
    pub player_id: String,
    pub user_name: String,
    pub score: u32,
    pub selected_answer: Option<String>,
    pub feedback: Option<String>,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            code: value.code,
            host_id: value.host_id,
            host_name: value.host_name,
            questions: value.questions,
            current_question_index: value.current_question_index,
            quiz_ended: value.quiz_ended,
            player_ids: value.players.iter().map(|p| p.id.clone()).collect(),
            created_at: DateTime::from_system_time(value.created_at),
            last_activity: DateTime::from_system_time(value.last_activity),
        }
    }
}

impl MongoSessionDocument {
    /// Reassemble the shared entity from the document and its player records.
    pub fn into_entity(self, players: Vec<PlayerEntity>) -> SessionEntity {
        SessionEntity {
            code: self.code,
            host_id: self.host_id,
            host_name: self.host_name,
            questions: self.questions,
            current_question_index: self.current_question_index,
            quiz_ended: self.quiz_ended,
            players,
            created_at: self.created_at.to_system_time(),
            last_activity: self.last_activity.to_system_time(),
        }
    }
}

impl From<(String, PlayerEntity)> for MongoPlayerDocument {
    fn from((code, player): (String, PlayerEntity)) -> Self {
        Self {
            code,
            player_id: player.id,
            user_name: player.user_name,
            score: player.score,
            selected_answer: player.selected_answer,
            feedback: player.feedback,
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.player_id,
            user_name: value.user_name,
            score: value.score,
            selected_answer: value.selected_answer,
            feedback: value.feedback,
        }
    }
}

pub fn doc_code(code: &str) -> Document {
    doc! {"_id": code}
}

pub fn doc_player(code: &str, player_id: &str) -> Document {
    doc! {"code": code, "player_id": player_id}
}
