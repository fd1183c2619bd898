//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("temp file not found for upload {0}")]
    TempMissing(String),

    #[error("assembled length {actual} does not match declared size {declared}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("chunked uploads are not supported on the {0} backend")]
    UnsupportedBackend(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] sluice_core::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
