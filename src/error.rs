use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{outbox::OutboxError, session::SessionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller has no resolved identity yet.
    #[error("identity not ready: {0}")]
    IdentityNotReady(String),
    /// No free session code could be allocated.
    #[error("could not allocate a session code after {attempts} attempts")]
    CodeExhaustion {
        /// How many candidate codes were probed.
        attempts: u32,
    },
    /// Caller is not allowed to perform the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The generative text backend failed or returned an unusable payload.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    /// The offline queue cannot hold more operations.
    #[error("offline queue is full ({capacity} pending operations)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotAuthorized { identity, action } => {
                ServiceError::NotAuthorized(format!("{identity} may not {action}"))
            }
            SessionError::UnknownPlayer(id) => {
                ServiceError::NotFound(format!("player {id} is not part of this session"))
            }
            SessionError::QuizEnded => ServiceError::InvalidState("the quiz has ended".into()),
        }
    }
}

impl From<OutboxError> for ServiceError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::Full { capacity } => ServiceError::QueueFull { capacity },
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::IdentityNotReady(message) => AppError::BadRequest(message),
            ServiceError::CodeExhaustion { attempts } => AppError::ServiceUnavailable(format!(
                "no free session code after {attempts} attempts"
            )),
            ServiceError::NotAuthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::GenerationFailed(message) => AppError::ServiceUnavailable(message),
            ServiceError::QueueFull { capacity } => AppError::ServiceUnavailable(format!(
                "offline queue is full ({capacity} pending operations)"
            )),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_rule_errors_map_to_service_errors() {
        let err: ServiceError = SessionError::QuizEnded.into();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err: ServiceError = SessionError::NotAuthorized {
            identity: "player-1".into(),
            action: "advance the question".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
    }

    #[test]
    fn http_status_mapping() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
