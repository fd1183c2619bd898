//! Refusing writer for backends that cannot carry chunked uploads.

use crate::error::{StorageError, StorageResult};
use crate::traits::ChunkWriter;
use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::config::UploadRules;
use sluice_core::session::FileInfo;

/// A writer that refuses every operation.
///
/// Installed when the configured backend is not a local filesystem, so the
/// service still comes up (the non-chunked upload path is unaffected) while
/// every chunk request fails with `UnsupportedBackend`.
pub struct UnsupportedWriter {
    backend: &'static str,
}

impl UnsupportedWriter {
    /// Create a refusing writer naming the configured backend.
    pub fn new(backend: &'static str) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ChunkWriter for UnsupportedWriter {
    async fn store_chunk(
        &self,
        _upload_id: &str,
        _chunk_index: u32,
        _data: Bytes,
        _chunk_size: u64,
        _ext: &str,
    ) -> StorageResult<()> {
        Err(StorageError::UnsupportedBackend(self.backend))
    }

    async fn assemble(
        &self,
        _upload_id: &str,
        _file_info: &FileInfo,
        _rules: &UploadRules,
    ) -> StorageResult<String> {
        Err(StorageError::UnsupportedBackend(self.backend))
    }

    async fn cleanup(&self, _upload_id: &str, _ext: &str) {}

    fn backend_name(&self) -> &'static str {
        self.backend
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
