use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::QuestionEntity;

/// Default number of intents the outbox will hold before refusing new ones.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// A mutating session operation captured while the store is unreachable.
///
/// Intents are serializable so the queue survives inspection and logging, and
/// each carries enough data to be replayed without the originating request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionIntent {
    /// Create a session on behalf of a host; the code is allocated at replay.
    CreateSession {
        /// Identity of the creating client.
        host_id: String,
        /// Display name of the host.
        host_name: String,
    },
    /// Join an existing session.
    JoinSession {
        /// Normalized session code.
        code: String,
        /// Identity of the joining client.
        player_id: String,
        /// Display name of the joining client.
        user_name: String,
    },
    /// Record a player's answer for the current question.
    SubmitAnswer {
        /// Normalized session code.
        code: String,
        /// Identity of the answering player.
        player_id: String,
        /// Option text that was selected.
        answer: String,
    },
    /// Advance to the next question.
    AdvanceQuestion {
        /// Normalized session code.
        code: String,
        /// Identity of the host issuing the advance.
        host_id: String,
    },
    /// Reset the session for a fresh run.
    RestartSession {
        /// Normalized session code.
        code: String,
        /// Identity of the host issuing the restart.
        host_id: String,
    },
    /// Append one question to the session.
    AppendQuestion {
        /// Normalized session code.
        code: String,
        /// Identity of the host appending the question.
        host_id: String,
        /// Question to append.
        question: QuestionEntity,
    },
}

impl SessionIntent {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionIntent::CreateSession { .. } => "create_session",
            SessionIntent::JoinSession { .. } => "join_session",
            SessionIntent::SubmitAnswer { .. } => "submit_answer",
            SessionIntent::AdvanceQuestion { .. } => "advance_question",
            SessionIntent::RestartSession { .. } => "restart_session",
            SessionIntent::AppendQuestion { .. } => "append_question",
        }
    }
}

/// An intent queued for replay, tagged with its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIntent {
    /// Idempotency key; replay skips keys that already applied.
    pub key: Uuid,
    /// The captured operation.
    pub intent: SessionIntent,
    /// When the intent entered the queue.
    pub queued_at: SystemTime,
}

/// Errors raised when capturing an intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    /// The queue reached its capacity; the caller must retry once online.
    #[error("offline queue is full ({capacity} pending operations)")]
    Full {
        /// Configured queue capacity.
        capacity: usize,
    },
}

struct OutboxInner {
    queue: VecDeque<PendingIntent>,
    applied: HashSet<Uuid>,
}

/// Bounded FIFO of mutating operations captured while degraded.
///
/// Intents drain strictly in enqueue order; a failure of one intent never
/// blocks the ones behind it. Keys recorded as applied are skipped on replay
/// so a drain interrupted halfway cannot apply an intent twice.
pub struct Outbox {
    inner: Mutex<OutboxInner>,
    capacity: usize,
}

impl Outbox {
    /// Create an outbox holding at most `capacity` pending intents.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(OutboxInner {
                queue: VecDeque::new(),
                applied: HashSet::new(),
            }),
            capacity,
        }
    }

    /// Capture an intent for later replay, returning its idempotency key.
    pub fn enqueue(&self, intent: SessionIntent) -> Result<Uuid, OutboxError> {
        let mut inner = self.inner.lock().expect("outbox mutex poisoned");
        if inner.queue.len() >= self.capacity {
            return Err(OutboxError::Full {
                capacity: self.capacity,
            });
        }

        let key = Uuid::new_v4();
        inner.queue.push_back(PendingIntent {
            key,
            intent,
            queued_at: SystemTime::now(),
        });
        Ok(key)
    }

    /// Take the oldest pending intent, if any.
    pub fn pop(&self) -> Option<PendingIntent> {
        let mut inner = self.inner.lock().expect("outbox mutex poisoned");
        inner.queue.pop_front()
    }

    /// Record that the intent behind `key` has landed in the store.
    pub fn mark_applied(&self, key: Uuid) {
        let mut inner = self.inner.lock().expect("outbox mutex poisoned");
        inner.applied.insert(key);
    }

    /// Whether the intent behind `key` already landed.
    pub fn is_applied(&self, key: Uuid) -> bool {
        let inner = self.inner.lock().expect("outbox mutex poisoned");
        inner.applied.contains(&key)
    }

    /// Forget every applied key, but only once the queue is empty.
    ///
    /// An empty queue means no pending intent can still carry one of these
    /// keys, so they will never be checked again. Called after a completed
    /// drain to keep the set from growing across degraded episodes.
    pub fn retire_applied(&self) {
        let mut inner = self.inner.lock().expect("outbox mutex poisoned");
        if inner.queue.is_empty() {
            inner.applied.clear();
        }
    }

    /// Number of intents waiting for replay.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("outbox mutex poisoned");
        inner.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(code: &str, player: &str) -> SessionIntent {
        SessionIntent::SubmitAnswer {
            code: code.into(),
            player_id: player.into(),
            answer: "Merlot".into(),
        }
    }

    #[test]
    fn drains_in_enqueue_order() {
        let outbox = Outbox::new(8);
        outbox.enqueue(submit("ABCD", "p1")).unwrap();
        outbox.enqueue(submit("ABCD", "p2")).unwrap();
        outbox.enqueue(submit("ABCD", "p3")).unwrap();

        let order: Vec<String> = std::iter::from_fn(|| outbox.pop())
            .map(|pending| match pending.intent {
                SessionIntent::SubmitAnswer { player_id, .. } => player_id,
                other => panic!("unexpected intent {other:?}"),
            })
            .collect();
        assert_eq!(order, ["p1", "p2", "p3"]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn refuses_intents_past_capacity() {
        let outbox = Outbox::new(2);
        outbox.enqueue(submit("ABCD", "p1")).unwrap();
        outbox.enqueue(submit("ABCD", "p2")).unwrap();

        let err = outbox.enqueue(submit("ABCD", "p3")).unwrap_err();
        assert_eq!(err, OutboxError::Full { capacity: 2 });
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn applied_keys_are_remembered() {
        let outbox = Outbox::new(8);
        let key = outbox.enqueue(submit("ABCD", "p1")).unwrap();
        assert!(!outbox.is_applied(key));

        let pending = outbox.pop().unwrap();
        assert_eq!(pending.key, key);
        outbox.mark_applied(key);
        assert!(outbox.is_applied(key));
    }

    #[test]
    fn retiring_applied_keys_requires_an_empty_queue() {
        let outbox = Outbox::new(8);
        let first = outbox.enqueue(submit("ABCD", "p1")).unwrap();
        let second = outbox.enqueue(submit("ABCD", "p2")).unwrap();

        outbox.pop().unwrap();
        outbox.mark_applied(first);
        outbox.retire_applied();
        // An intent is still queued, so its key set must survive.
        assert!(outbox.is_applied(first));

        outbox.pop().unwrap();
        outbox.mark_applied(second);
        outbox.retire_applied();
        assert!(!outbox.is_applied(first));
        assert!(!outbox.is_applied(second));
    }

    #[test]
    fn intents_serialize_with_kind_tags() {
        let json = serde_json::to_value(submit("ABCD", "p1")).unwrap();
        assert_eq!(json["kind"], "submit_answer");
        assert_eq!(json["code"], "ABCD");
    }
}
