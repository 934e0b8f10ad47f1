use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPlayerDocument, MongoSessionDocument, doc_code, doc_player},
};
use crate::dao::{
    models::{PlayerEntity, SessionEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const PLAYER_COLLECTION_NAME: &str = "players";

/// Duplicate-key error code raised when an `_id` is already taken.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed session store.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Unique index so (code, player_id) upserts stay one-record-per-player.
        let player_collection = database.collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME);
        let player_index = mongodb::IndexModel::builder()
            .keys(doc! {"code": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_session_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        player_collection
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "code,player_id",
                source,
            })?;

        // The retention sweep filters on last_activity.
        let session_collection = database.collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME);
        let activity_index = mongodb::IndexModel::builder()
            .keys(doc! {"last_activity": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_activity_idx".to_owned()))
                    .build(),
            )
            .build();

        session_collection
            .create_index(activity_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "last_activity",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn session_collection(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn insert_session(&self, session: SessionEntity) -> MongoResult<bool> {
        let code = session.code.clone();
        let players = session.players.clone();
        let document: MongoSessionDocument = session.into();

        let collection = self.session_collection().await;
        match collection.insert_one(&document).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => return Ok(false),
            Err(source) => return Err(MongoDaoError::SaveSession { code, source }),
        }

        for player in players {
            self.upsert_player(&code, player).await?;
        }
        Ok(true)
    }

    async fn save_session(&self, session: SessionEntity) -> MongoResult<()> {
        let code = session.code.clone();
        let players = session.players.clone();

        for player in players {
            self.upsert_player(&code, player).await?;
        }

        let document: MongoSessionDocument = session.into();
        let collection = self.session_collection().await;
        collection
            .replace_one(doc_code(&code), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { code, source })?;

        Ok(())
    }

    async fn upsert_player(&self, code: &str, player: PlayerEntity) -> MongoResult<()> {
        let collection = self.player_collection().await;
        let document: MongoPlayerDocument = (code.to_owned(), player).into();

        collection
            .replace_one(doc_player(code, &document.player_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                code: code.to_owned(),
                player_id: document.player_id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn find_session(&self, code: String) -> MongoResult<Option<SessionEntity>> {
        let collection = self.session_collection().await;

        let document = collection
            .find_one(doc_code(&code))
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                code: code.clone(),
                source,
            })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let player_docs: Vec<MongoPlayerDocument> = self
            .player_collection()
            .await
            .find(doc! { "code": &code })
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                code: code.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                code: code.clone(),
                source,
            })?;

        let mut by_id: HashMap<String, PlayerEntity> = player_docs
            .into_iter()
            .map(|doc| (doc.player_id.clone(), doc.into()))
            .collect();

        // Order players according to the session document's join-order list.
        let players = document
            .player_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        Ok(Some(document.into_entity(players)))
    }

    async fn delete_session(&self, code: String) -> MongoResult<bool> {
        let session_collection = self.session_collection().await;
        let result = session_collection
            .delete_one(doc_code(&code))
            .await
            .map_err(|source| MongoDaoError::DeleteSession {
                code: code.clone(),
                source,
            })?;

        self.player_collection()
            .await
            .delete_many(doc! { "code": &code })
            .await
            .map_err(|source| MongoDaoError::DeleteSession {
                code: code.clone(),
                source,
            })?;

        Ok(result.deleted_count > 0)
    }

    async fn delete_idle_since(&self, cutoff: SystemTime) -> MongoResult<Vec<String>> {
        let collection = self.session_collection().await;
        let filter = doc! { "last_activity": { "$lt": DateTime::from_system_time(cutoff) } };

        let stale: Vec<MongoSessionDocument> = collection
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Sweep { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Sweep { source })?;

        let mut removed = Vec::with_capacity(stale.len());
        for document in stale {
            if self.delete_session(document.code.clone()).await? {
                removed.push(document.code);
            }
        }
        Ok(removed)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl SessionStore for MongoSessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn find_session(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(code).await.map_err(Into::into) })
    }

    fn save_player(
        &self,
        code: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            // Keep the join-order list in the session document in sync for
            // players seen for the first time, and refresh the activity
            // timestamp so player-only traffic keeps the session alive.
            let collection = store.session_collection().await;
            collection
                .update_one(
                    doc_code(&code),
                    doc! {
                        "$addToSet": { "player_ids": &player.id },
                        "$set": { "last_activity": DateTime::now() },
                    },
                )
                .await
                .map_err(|source| MongoDaoError::SavePlayer {
                    code: code.clone(),
                    player_id: player.id.clone(),
                    source,
                })?;

            store.upsert_player(&code, player).await.map_err(Into::into)
        })
    }

    fn delete_session(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_session(code).await.map_err(Into::into) })
    }

    fn delete_idle_since(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.delete_idle_since(cutoff).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
