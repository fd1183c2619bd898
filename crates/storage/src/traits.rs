//! Chunk writer trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::config::UploadRules;
use sluice_core::session::FileInfo;

/// Writer for chunked uploads: positioned writes into one sparse temp file
/// per upload, followed by assembly to a final content-addressed location.
///
/// `upload_id` and `ext` are sanitized before they touch the filesystem;
/// an id that sanitizes to nothing is rejected.
#[async_trait]
pub trait ChunkWriter: Send + Sync + 'static {
    /// Write `data` at offset `chunk_index * chunk_size` of the upload's
    /// temp file. The write is durable (fsync'd) before this returns; any
    /// I/O failure is an error and no partial success is ever reported.
    /// Repeating the same chunk yields the same file state.
    async fn store_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        data: Bytes,
        chunk_size: u64,
        ext: &str,
    ) -> StorageResult<()>;

    /// Verify the temp file's length against the declared size, run the
    /// validation ruleset, move the file to a random final name (atomic
    /// rename) and write the metadata sidecar. Returns the final filename
    /// relative to the uploads directory. On any failure the temp file is
    /// deleted.
    async fn assemble(
        &self,
        upload_id: &str,
        file_info: &FileInfo,
        rules: &UploadRules,
    ) -> StorageResult<String>;

    /// Best-effort removal of the upload's temp file.
    async fn cleanup(&self, upload_id: &str, ext: &str);

    /// Static identifier for the backend type, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
