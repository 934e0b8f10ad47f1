use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures specific to the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed into client options.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// The URI that failed to parse.
        uri: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the assembled client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Every ping attempt failed while establishing the connection.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of ping attempts made before giving up.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: MongoError,
    },
    /// A routine ping against an established connection failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// An index required by the store could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Name of the index that failed.
        index: &'static str,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a session document failed.
    #[error("failed to save session `{code}`")]
    SaveSession {
        /// Code of the session being written.
        code: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a player document failed.
    #[error("failed to save player `{player_id}` of session `{code}`")]
    SavePlayer {
        /// Code of the session the player belongs to.
        code: String,
        /// Identity of the player being written.
        player_id: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a session document failed.
    #[error("failed to load session `{code}`")]
    LoadSession {
        /// Code of the session being read.
        code: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting a session and its players failed.
    #[error("failed to delete session `{code}`")]
    DeleteSession {
        /// Code of the session being deleted.
        code: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// The idle-session sweep query failed.
    #[error("failed to sweep idle sessions")]
    Sweep {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// A required environment variable is unset.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
}
