use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::database::RepoError;
use crate::providers::ProviderError;

/// The error taxonomy the HTTP boundary understands. Inner layers (services,
/// repositories, provider adapters) raise these or `anyhow::Error`/`RepoError`
/// and convert into this enum only at the handler boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("{0}")]
    StoreUnavailable(String),

    #[error("request exceeded its deadline")]
    Timeout,

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    code: u16,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::ValidationError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ApiError::ProviderUnavailable(_) => (StatusCode::BAD_GATEWAY, "ProviderUnavailable"),
            ApiError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "StoreUnavailable"),
            ApiError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Timeout"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();

        match &self {
            ApiError::ValidationError(msg) => tracing::warn!(kind, message = %msg, "rejected request"),
            ApiError::NotFound(msg) => tracing::debug!(kind, message = %msg, "not found"),
            ApiError::Conflict(msg) => tracing::debug!(kind, message = %msg, "conflict"),
            ApiError::ProviderUnavailable(msg) => {
                tracing::error!(kind, message = %msg, "provider unavailable")
            }
            ApiError::StoreUnavailable(msg) => tracing::error!(kind, message = %msg, "store unavailable"),
            ApiError::Timeout => tracing::error!(kind, "deadline exceeded"),
            ApiError::Internal(msg) => tracing::error!(kind, message = %msg, "internal error"),
        }

        let body = ErrorBody {
            error: kind,
            detail: self.to_string(),
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// `RepoError::Conflict` carries no message of its own by the time it reaches
/// the boundary beyond what the database gave it. 404s are never produced by
/// `RepoError` itself: every get/delete path builds `ApiError::NotFound`
/// directly from the `Option`/bool the repository returns, since only the
/// calling service knows which entity was being looked up.
impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Other(err) => ApiError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient(msg) | ProviderError::Permanent(msg) => {
                ApiError::ProviderUnavailable(msg)
            }
            ProviderError::Unavailable(msg) => ApiError::ProviderUnavailable(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
