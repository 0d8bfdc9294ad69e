//! Registry error types.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::ErrorResponse;

/// Registry errors.
///
/// Every registry operation is total over in-memory state; the only way a
/// request fails is malformed input.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Request body was malformed or carried invalid fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error while binding or serving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RegistryError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RegistryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = %status, error = %self, "Rejecting registry request");
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
