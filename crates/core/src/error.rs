//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("chunk index {index} out of range (total {total})")]
    InvalidChunkIndex { index: u32, total: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upload session error: {0}")]
    Session(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
