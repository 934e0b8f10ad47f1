/// In-memory backend used by tests and store-less deployments.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{PlayerEntity, SessionEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for game-session documents.
///
/// `insert_session` makes the existence probe and the initial write a single
/// atomic step, and `save_player` updates one player record keyed by
/// `(code, player_id)` so concurrent submissions by different players cannot
/// overwrite each other's entries.
pub trait SessionStore: Send + Sync {
    /// Insert a new session only if its code is free; `false` means taken.
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Overwrite the session document addressed by its code.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Point read of a session document.
    fn find_session(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Upsert a single player record within a session.
    fn save_player(
        &self,
        code: String,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a session; `true` when a document was removed.
    fn delete_session(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every session whose `last_activity` is older than the cutoff,
    /// returning the codes that were removed.
    fn delete_idle_since(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
