//! Error types and error handling

use crate::jobs::JobError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Top-level error for setting up and running the service
#[derive(Debug, Error)]
pub enum SqueezeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Batch engine error
    #[error(transparent)]
    Job(#[from] JobError),

    /// State store error
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error (binding, serving)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response for the HTTP API
///
/// Serializes as `{"success": false, "code": "...", "message": "..."}` with
/// the status code matching the error class.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub JobError);

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            JobError::InvalidJobType(_) => StatusCode::BAD_REQUEST,
            JobError::NoItemsFound | JobError::NoActiveJob => StatusCode::NOT_FOUND,
            JobError::JobAlreadyRunning | JobError::StateConflict { .. } => StatusCode::CONFLICT,
            JobError::Store(_) | JobError::Catalog(_) => StatusCode::SERVICE_UNAVAILABLE,
            JobError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_fatal() {
            tracing::error!(error = %self.0, code = self.0.code(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "success": false,
                "code": self.0.code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}
