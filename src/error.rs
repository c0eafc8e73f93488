use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    engine::{Rejection, SyncError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No remote store is installed.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The engine refused the operation in its current state.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SyncError> for ServiceError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unavailable => ServiceError::Degraded,
            SyncError::Push { source, .. } | SyncError::Load(source) => {
                ServiceError::Unavailable(source)
            }
            SyncError::Rejected(rejection) => ServiceError::Rejected(rejection),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Nothing to show, typically no live game.
    #[error("not found: {0}")]
    NotFound(String),
    /// The live game is not in a state that allows the call. `reason` is machine-readable.
    #[error("conflict: {message}")]
    Conflict {
        reason: &'static str,
        message: String,
    },
    /// The remote store is missing or failing.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Rejected(rejection) => AppError::Conflict {
                reason: rejection.reason(),
                message: rejection.to_string(),
            },
            ServiceError::InvalidState(message) => AppError::Conflict {
                reason: "invalid_state",
                message,
            },
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            reason: match self {
                AppError::Conflict { reason, .. } => Some(reason),
                _ => None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self.body())).into_response()
    }
}
