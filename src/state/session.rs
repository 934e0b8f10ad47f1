use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;

use crate::dao::models::{PlayerEntity, QuestionEntity, SessionEntity};

/// Number of questions sampled from the bank for a fresh session.
pub const QUESTIONS_PER_SESSION: usize = 10;
/// Feedback label recorded for a correct submission.
pub const FEEDBACK_CORRECT: &str = "Correct!";
/// Feedback label recorded for an incorrect submission.
pub const FEEDBACK_INCORRECT: &str = "Incorrect";

/// Identity and display name of the client invoking a synchronizer operation.
///
/// Passed explicitly to every operation instead of being read from ambient
/// auth state. The identity string comes from the identity provider and is
/// treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Opaque, browser-session-stable identity string.
    pub identity: String,
    /// Display name, when the client has entered one.
    pub display_name: Option<String>,
}

impl SessionContext {
    /// Build a context for an identity with a known display name.
    pub fn named(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Build a context for operations that only need the identity.
    pub fn anonymous(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: None,
        }
    }
}

/// A single trivia question with its four options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt text shown to every participant.
    pub question: String,
    /// Exactly four distinct option strings.
    pub options: Vec<String>,
    /// The correct option; always equals one element of `options`.
    pub correct_answer: String,
    /// Supplementary text shown after answering.
    pub explanation: String,
}

/// Per-player state tracked inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Matches the client identity that joined.
    pub id: String,
    /// Display name captured at join time.
    pub user_name: String,
    /// Total score; only ever increases within a question cycle.
    pub score: u32,
    /// Option text chosen for the current question, cleared on every advance.
    pub selected_answer: Option<String>,
    /// Feedback label derived from the last selection, cleared on every advance.
    pub feedback: Option<String>,
}

impl PlayerState {
    /// Fresh player with a zero score and no per-question state.
    pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_name: user_name.into(),
            score: 0,
            selected_answer: None,
            feedback: None,
        }
    }

    fn clear_round(&mut self) {
        self.selected_answer = None;
        self.feedback = None;
    }
}

/// Rule violations surfaced by session mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A host-only action was invoked by a non-host identity, or the host
    /// tried to submit an answer.
    #[error("identity `{identity}` is not allowed to {action}")]
    NotAuthorized {
        /// Identity that attempted the action.
        identity: String,
        /// Human-readable description of the refused action.
        action: &'static str,
    },
    /// The identity has no player entry in this session.
    #[error("player `{0}` has not joined this session")]
    UnknownPlayer(String),
    /// The quiz already ended, so no answer can be recorded.
    #[error("the quiz has already ended")]
    QuizEnded,
}

/// Outcome of an answer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The selection was recorded.
    Recorded {
        /// Whether the selection matched the correct answer.
        correct: bool,
    },
    /// The player already answered the current question; nothing changed.
    AlreadyAnswered,
}

/// Outcome of a host-driven question advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the question at this index.
    Advanced(usize),
    /// The last question was passed; the quiz is now ended.
    Ended,
}

/// The shared game document: one per active session, keyed by its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    /// Four uppercase letters identifying the session.
    pub code: String,
    /// Identity of the creating client; immutable for the session's life.
    pub host_id: String,
    /// Display name of the host captured at creation.
    pub host_name: String,
    /// Ordered question sequence; 10 at creation, may grow via appends.
    pub questions: Vec<Question>,
    /// 0-based index of the question currently in play.
    pub current_question_index: usize,
    /// Set once the last question has been passed or the host ended the quiz.
    pub quiz_ended: bool,
    /// Players keyed by identity, in join order.
    pub players: IndexMap<String, PlayerState>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Updated on every mutating operation; drives the retention sweep.
    pub last_activity: SystemTime,
}

impl GameSession {
    /// Create a session owned by the given host with a freshly sampled
    /// question set and an empty player list.
    pub fn new(
        code: impl Into<String>,
        host_id: &str,
        host_name: &str,
        questions: Vec<Question>,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            code: code.into(),
            host_id: host_id.to_owned(),
            host_name: host_name.to_owned(),
            questions,
            current_question_index: 0,
            quiz_ended: false,
            players: IndexMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Whether `identity` owns this session.
    pub fn is_host(&self, identity: &str) -> bool {
        self.host_id == identity
    }

    /// The question currently in play, if the index is in bounds.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Add a player, returning `true` when a new entry was inserted.
    ///
    /// Idempotent for an identity that already joined: the existing entry is
    /// left untouched and no duplicate is created.
    pub fn join(&mut self, identity: &str, user_name: &str) -> bool {
        if self.players.contains_key(identity) {
            return false;
        }
        self.players
            .insert(identity.to_owned(), PlayerState::new(identity, user_name));
        self.touch();
        true
    }

    /// Record a player's selection for the current question.
    ///
    /// A resubmission before the next advance is a no-op so the score cannot
    /// be double-counted.
    pub fn submit_answer(
        &mut self,
        identity: &str,
        answer: &str,
    ) -> Result<SubmitOutcome, SessionError> {
        if self.is_host(identity) {
            return Err(SessionError::NotAuthorized {
                identity: identity.to_owned(),
                action: "submit an answer",
            });
        }
        if self.quiz_ended {
            return Err(SessionError::QuizEnded);
        }
        let Some(question) = self.current_question().cloned() else {
            return Err(SessionError::QuizEnded);
        };

        let player = self
            .players
            .get_mut(identity)
            .ok_or_else(|| SessionError::UnknownPlayer(identity.to_owned()))?;

        if player.selected_answer.is_some() {
            return Ok(SubmitOutcome::AlreadyAnswered);
        }

        let correct = question.correct_answer == answer;
        if correct {
            player.score += 1;
        }
        player.selected_answer = Some(answer.to_owned());
        player.feedback = Some(if correct { FEEDBACK_CORRECT } else { FEEDBACK_INCORRECT }.into());
        self.touch();

        Ok(SubmitOutcome::Recorded { correct })
    }

    /// Move to the next question, or end the quiz when none remains.
    ///
    /// Clears every player's per-question state either way. The index is
    /// never advanced past the last valid question: passing it flips
    /// `quiz_ended` instead.
    pub fn advance(&mut self, identity: &str) -> Result<AdvanceOutcome, SessionError> {
        self.require_host(identity, "advance the question")?;

        for player in self.players.values_mut() {
            player.clear_round();
        }

        let outcome = if self.current_question_index + 1 < self.questions.len() {
            self.current_question_index += 1;
            AdvanceOutcome::Advanced(self.current_question_index)
        } else {
            self.quiz_ended = true;
            AdvanceOutcome::Ended
        };
        self.touch();
        Ok(outcome)
    }

    /// Reset the session to a fresh quiz with a newly sampled question set.
    pub fn restart(
        &mut self,
        identity: &str,
        questions: Vec<Question>,
    ) -> Result<(), SessionError> {
        self.require_host(identity, "restart the session")?;

        self.questions = questions;
        self.current_question_index = 0;
        self.quiz_ended = false;
        for player in self.players.values_mut() {
            player.score = 0;
            player.clear_round();
        }
        self.touch();
        Ok(())
    }

    /// Append one externally supplied question without touching the index.
    pub fn append_question(
        &mut self,
        identity: &str,
        question: Question,
    ) -> Result<(), SessionError> {
        self.require_host(identity, "append a question")?;
        self.questions.push(question);
        self.touch();
        Ok(())
    }

    fn require_host(&self, identity: &str, action: &'static str) -> Result<(), SessionError> {
        if !self.is_host(identity) {
            return Err(SessionError::NotAuthorized {
                identity: identity.to_owned(),
                action,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_activity = SystemTime::now();
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

impl From<PlayerEntity> for PlayerState {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            user_name: value.user_name,
            score: value.score,
            selected_answer: value.selected_answer,
            feedback: value.feedback,
        }
    }
}

impl From<PlayerState> for PlayerEntity {
    fn from(value: PlayerState) -> Self {
        Self {
            id: value.id,
            user_name: value.user_name,
            score: value.score,
            selected_answer: value.selected_answer,
            feedback: value.feedback,
        }
    }
}

impl From<SessionEntity> for GameSession {
    fn from(value: SessionEntity) -> Self {
        Self {
            code: value.code,
            host_id: value.host_id,
            host_name: value.host_name,
            questions: value.questions.into_iter().map(Into::into).collect(),
            current_question_index: value.current_question_index,
            quiz_ended: value.quiz_ended,
            players: value
                .players
                .into_iter()
                .map(|player| (player.id.clone(), player.into()))
                .collect(),
            created_at: value.created_at,
            last_activity: value.last_activity,
        }
    }
}

impl From<GameSession> for SessionEntity {
    fn from(value: GameSession) -> Self {
        Self {
            code: value.code,
            host_id: value.host_id,
            host_name: value.host_name,
            questions: value.questions.into_iter().map(Into::into).collect(),
            current_question_index: value.current_question_index,
            quiz_ended: value.quiz_ended,
            players: value.players.into_values().map(Into::into).collect(),
            created_at: value.created_at,
            last_activity: value.last_activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|index| Question {
                question: format!("Question {index}?"),
                options: vec![
                    format!("right-{index}"),
                    format!("wrong-a-{index}"),
                    format!("wrong-b-{index}"),
                    format!("wrong-c-{index}"),
                ],
                correct_answer: format!("right-{index}"),
                explanation: format!("Because {index}."),
            })
            .collect()
    }

    fn session_with_player() -> GameSession {
        let mut session = GameSession::new("ABCD", "host-1", "Margaux", sample_questions(10));
        session.join("player-1", "P1");
        session
    }

    #[test]
    fn join_is_idempotent_per_identity() {
        let mut session = session_with_player();
        assert!(!session.join("player-1", "P1 again"));
        assert_eq!(session.players.len(), 1);
        assert_eq!(session.players["player-1"].user_name, "P1");
    }

    #[test]
    fn correct_answer_scores_exactly_once() {
        let mut session = session_with_player();

        let outcome = session.submit_answer("player-1", "right-0").unwrap();
        assert_eq!(outcome, SubmitOutcome::Recorded { correct: true });

        let player = &session.players["player-1"];
        assert_eq!(player.score, 1);
        assert_eq!(player.selected_answer.as_deref(), Some("right-0"));
        assert_eq!(player.feedback.as_deref(), Some(FEEDBACK_CORRECT));

        // A resubmission before the next advance must not double-count.
        let outcome = session.submit_answer("player-1", "right-0").unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadyAnswered);
        assert_eq!(session.players["player-1"].score, 1);
    }

    #[test]
    fn incorrect_answer_records_feedback_without_scoring() {
        let mut session = session_with_player();
        let outcome = session.submit_answer("player-1", "wrong-a-0").unwrap();
        assert_eq!(outcome, SubmitOutcome::Recorded { correct: false });

        let player = &session.players["player-1"];
        assert_eq!(player.score, 0);
        assert_eq!(player.feedback.as_deref(), Some(FEEDBACK_INCORRECT));
    }

    #[test]
    fn host_cannot_submit_answers() {
        let mut session = session_with_player();
        let err = session.submit_answer("host-1", "right-0").unwrap_err();
        assert!(matches!(err, SessionError::NotAuthorized { .. }));
    }

    #[test]
    fn unknown_player_cannot_submit() {
        let mut session = session_with_player();
        let err = session.submit_answer("stranger", "right-0").unwrap_err();
        assert_eq!(err, SessionError::UnknownPlayer("stranger".into()));
    }

    #[test]
    fn advance_clears_round_state_and_moves_index() {
        let mut session = session_with_player();
        session.submit_answer("player-1", "right-0").unwrap();

        let outcome = session.advance("host-1").unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced(1));
        assert_eq!(session.current_question_index, 1);

        let player = &session.players["player-1"];
        assert!(player.selected_answer.is_none());
        assert!(player.feedback.is_none());
        assert_eq!(player.score, 1);
    }

    #[test]
    fn advance_by_non_host_changes_nothing() {
        let mut session = session_with_player();
        let err = session.advance("player-1").unwrap_err();
        assert!(matches!(err, SessionError::NotAuthorized { .. }));
        assert_eq!(session.current_question_index, 0);
        assert!(!session.quiz_ended);
    }

    #[test]
    fn advancing_past_last_question_ends_quiz_without_moving_index() {
        let mut session = session_with_player();
        session.current_question_index = session.questions.len() - 1;

        let outcome = session.advance("host-1").unwrap();
        assert_eq!(outcome, AdvanceOutcome::Ended);
        assert!(session.quiz_ended);
        assert_eq!(session.current_question_index, session.questions.len() - 1);
    }

    #[test]
    fn submit_after_quiz_end_is_rejected() {
        let mut session = session_with_player();
        session.quiz_ended = true;
        let err = session.submit_answer("player-1", "right-0").unwrap_err();
        assert_eq!(err, SessionError::QuizEnded);
    }

    #[test]
    fn restart_resets_scores_round_state_and_questions() {
        let mut session = session_with_player();
        session.submit_answer("player-1", "right-0").unwrap();
        session.advance("host-1").unwrap();

        let fresh = sample_questions(10);
        session.restart("host-1", fresh.clone()).unwrap();

        assert_eq!(session.current_question_index, 0);
        assert!(!session.quiz_ended);
        assert_eq!(session.questions, fresh);
        let player = &session.players["player-1"];
        assert_eq!(player.score, 0);
        assert!(player.selected_answer.is_none());
        assert!(player.feedback.is_none());
    }

    #[test]
    fn append_question_keeps_index_in_place() {
        let mut session = session_with_player();
        session.advance("host-1").unwrap();
        let extra = sample_questions(11).pop().unwrap();

        session.append_question("host-1", extra.clone()).unwrap();
        assert_eq!(session.questions.len(), 11);
        assert_eq!(session.current_question_index, 1);
        assert_eq!(session.questions.last(), Some(&extra));

        let err = session.append_question("player-1", extra).unwrap_err();
        assert!(matches!(err, SessionError::NotAuthorized { .. }));
    }

    #[test]
    fn entity_round_trip_preserves_player_state() {
        let mut session = session_with_player();
        session.submit_answer("player-1", "right-0").unwrap();

        let entity: SessionEntity = session.clone().into();
        let restored: GameSession = entity.into();
        assert_eq!(restored, session);
    }
}
