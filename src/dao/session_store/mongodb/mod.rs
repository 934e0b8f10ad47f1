mod connection;
mod error;
mod models;
/// MongoDB configuration loading.
pub mod config;
/// MongoDB-backed [`SessionStore`](crate::dao::session_store::SessionStore).
pub mod store;

pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
