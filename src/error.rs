use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{models::ErrorResponse, repository::RepositoryError};

/// AppError
///
/// The single failure type returned by handlers and the auth extractor. Each
/// variant maps to exactly one HTTP status; the body is always an
/// `ErrorResponse` with a generic `error` and a `details` string.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input (400).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bad credentials or a missing/invalid/expired token (401).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Authenticated, but the role is insufficient (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No record matched the id and ownership scope (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The store failed (500).
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Anything else that is our fault (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing body. Store and internal failures are logged here and
    /// replaced with a generic detail so no driver text leaks out.
    pub fn to_body(&self) -> ErrorResponse {
        let (error, details) = match self {
            Self::Validation(details) => ("Validation failed", details.clone()),
            Self::Auth(details) => ("Authentication failed", details.clone()),
            Self::Forbidden(details) => ("Admin access required", details.clone()),
            Self::NotFound(details) => ("Not found", details.clone()),
            Self::Repository(_) | Self::Internal(_) => (
                "Internal server error",
                "An unexpected error occurred".to_string(),
            ),
        };

        ErrorResponse {
            error: error.to_string(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.to_body())).into_response()
    }
}

/// Result alias used across handlers.
pub type Result<T> = std::result::Result<T, AppError>;
