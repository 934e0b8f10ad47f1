use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    models::{PlayerEntity, SessionEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

/// Session store backed by process memory.
///
/// Serves two purposes: the backend for deployments built without the
/// `mongo-store` feature, and the store the test suite runs against.
/// Documents do not survive a restart.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, SessionEntity>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.sessions.entry(session.code.clone()) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(session);
                    Ok(true)
                }
            }
        })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.sessions.insert(session.code.clone(), session);
            Ok(())
        })
    }

    fn find_session(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.sessions.get(&code).map(|entry| entry.clone())) })
    }

    fn save_player(
        &self,
        code: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut entry) = store.sessions.get_mut(&code) {
                match entry.players.iter_mut().find(|p| p.id == player.id) {
                    Some(existing) => *existing = player,
                    None => entry.players.push(player),
                }
                entry.last_activity = SystemTime::now();
            }
            Ok(())
        })
    }

    fn delete_session(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.sessions.remove(&code).is_some()) })
    }

    fn delete_idle_since(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let expired: Vec<String> = store
                .sessions
                .iter()
                .filter(|entry| entry.last_activity < cutoff)
                .map(|entry| entry.key().clone())
                .collect();
            for code in &expired {
                store.sessions.remove(code);
            }
            Ok(expired)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entity(code: &str) -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            code: code.to_owned(),
            host_id: "host".into(),
            host_name: "Host".into(),
            questions: Vec::new(),
            current_question_index: 0,
            quiz_ended: false,
            players: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    #[tokio::test]
    async fn insert_refuses_taken_codes() {
        let store = MemorySessionStore::new();
        assert!(store.insert_session(entity("ABCD")).await.unwrap());
        assert!(!store.insert_session(entity("ABCD")).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_player_upserts_by_id() {
        let store = MemorySessionStore::new();
        store.insert_session(entity("ABCD")).await.unwrap();

        let player = PlayerEntity {
            id: "p1".into(),
            user_name: "P1".into(),
            score: 0,
            selected_answer: None,
            feedback: None,
        };
        store
            .save_player("ABCD".into(), player.clone())
            .await
            .unwrap();
        store
            .save_player(
                "ABCD".into(),
                PlayerEntity {
                    score: 1,
                    ..player
                },
            )
            .await
            .unwrap();

        let session = store.find_session("ABCD".into()).await.unwrap().unwrap();
        assert_eq!(session.players.len(), 1);
        assert_eq!(session.players[0].score, 1);
    }

    #[tokio::test]
    async fn idle_sweep_only_removes_stale_sessions() {
        let store = MemorySessionStore::new();
        let mut stale = entity("OLDE");
        stale.last_activity = SystemTime::now() - Duration::from_secs(60);
        store.insert_session(stale).await.unwrap();
        store.insert_session(entity("FRSH")).await.unwrap();

        let removed = store
            .delete_idle_since(SystemTime::now() - Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(removed, vec!["OLDE".to_owned()]);
        assert!(store.find_session("FRSH".into()).await.unwrap().is_some());
    }
}
