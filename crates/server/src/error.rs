//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unprocessable request: {0}")]
    Unprocessable(String),

    #[error("chunk hash mismatch for index {chunk_index}")]
    HashMismatch { chunk_index: u32 },

    #[error("declared size {declared} exceeds chunked upload cap {cap}")]
    SizeExceeded { declared: u64, cap: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("session store error: {0}")]
    Session(#[from] sluice_session::SessionError),

    #[error("storage error: {0}")]
    Storage(#[from] sluice_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] sluice_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        use sluice_storage::StorageError;

        match self {
            Self::NotFound(_) => "session_missing",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unprocessable(_) => "unprocessable",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::Internal(_) => "internal_error",
            Self::Session(_) => "session_store_error",
            Self::Storage(e) => match e {
                StorageError::UnsupportedBackend(_) => "unsupported_backend",
                StorageError::Validation(_) | StorageError::SizeMismatch { .. } => {
                    "validation_failed"
                }
                StorageError::Core(_) => "unprocessable",
                _ => "write_failure",
            },
            Self::Core(_) => "unprocessable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        use sluice_storage::StorageError;

        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::HashMismatch { .. } => StatusCode::CONFLICT,
            Self::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                // The assembled file failed its ruleset or lost bytes;
                // the request itself was well-formed but unacceptable.
                StorageError::Validation(_) | StorageError::SizeMismatch { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                StorageError::Core(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(e) => match e {
                sluice_core::Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 409 carries the retry signal the dispatcher keys on: the index of
        // the chunk whose bytes did not match their declared hash.
        if let Self::HashMismatch { chunk_index } = &self {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "chunkIndex": chunk_index })),
            )
                .into_response();
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
