//! Chunk file writer for the sluice chunked upload core.
//!
//! This crate provides:
//! - Positioned, fsync'd chunk writes into one sparse temp file per upload
//! - Assembly: length verification, ruleset validation, atomic rename to a
//!   random final name, JSON metadata sidecar
//! - Backend gating: chunked uploads exist only on a local filesystem

pub mod backends;
pub mod error;
pub mod rules;
pub mod traits;

pub use backends::filesystem::FilesystemWriter;
pub use backends::unsupported::UnsupportedWriter;
pub use error::{StorageError, StorageResult};
pub use traits::ChunkWriter;

use sluice_core::config::StorageConfig;
use std::sync::Arc;

/// Create a chunk writer from configuration.
///
/// Remote backends are refused outright: chunked uploads rely on positioned
/// writes into a file shared by all workers, which only a local filesystem
/// provides. The non-chunked upload path handles remote storage elsewhere.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ChunkWriter>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let writer = FilesystemWriter::new(path).await?;
            Ok(Arc::new(writer))
        }
        StorageConfig::S3 { .. } => Err(StorageError::UnsupportedBackend("s3")),
    }
}
