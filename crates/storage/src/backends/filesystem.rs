//! Local filesystem chunk writer.

use crate::error::{StorageError, StorageResult};
use crate::rules;
use crate::traits::ChunkWriter;
use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::config::UploadRules;
use sluice_core::sanitize::{sanitize_extension, sanitize_upload_id};
use sluice_core::session::FileInfo;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;

/// Length of the random final filename stem, in hex characters.
const FINAL_NAME_LEN: usize = 40;

/// Filesystem-backed chunk writer.
///
/// One sparse temp file per upload under the uploads directory. Chunks are
/// written at their canonical offsets and fsync'd before being
/// acknowledged; assembly is an atomic rename to a random final name plus a
/// JSON metadata sidecar.
pub struct FilesystemWriter {
    root: PathBuf,
}

impl FilesystemWriter {
    /// Create a new filesystem writer rooted at the uploads directory.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Filename for an upload's temp file: `sanitized(id).sanitized(ext)`.
    fn file_name(upload_id: &str, ext: &str) -> StorageResult<String> {
        let id = sanitize_upload_id(upload_id)?;
        let ext = sanitize_extension(ext);
        Ok(if ext.is_empty() { id } else { format!("{id}.{ext}") })
    }

    /// Path of an upload's temp file.
    pub fn temp_path(&self, upload_id: &str, ext: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(Self::file_name(upload_id, ext)?))
    }

    /// Path of a finalized file, given its relative name.
    pub fn final_path(&self, final_name: &str) -> PathBuf {
        self.root.join(final_name)
    }

    fn random_final_name(ext: &str) -> String {
        use rand::RngCore;
        let mut bytes = [0u8; FINAL_NAME_LEN / 2];
        rand::rng().fill_bytes(&mut bytes);
        let stem: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let ext = sanitize_extension(ext);
        if ext.is_empty() { stem } else { format!("{stem}.{ext}") }
    }

    async fn remove_temp(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
        }
    }
}

#[async_trait]
impl ChunkWriter for FilesystemWriter {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn store_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        data: Bytes,
        chunk_size: u64,
        ext: &str,
    ) -> StorageResult<()> {
        let path = self.temp_path(upload_id, ext)?;
        let offset = u64::from(chunk_index) * chunk_size;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        // Durability before acknowledgement: once the caller marks this
        // index received, the bytes must already be on disk.
        file.sync_all().await?;

        Ok(())
    }

    #[instrument(skip(self, file_info, rules), fields(backend = "filesystem"))]
    async fn assemble(
        &self,
        upload_id: &str,
        file_info: &FileInfo,
        rules: &UploadRules,
    ) -> StorageResult<String> {
        let ext = ext_of(file_info);
        let temp = self.temp_path(upload_id, &ext)?;

        let meta = match fs::metadata(&temp).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::TempMissing(upload_id.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        if meta.len() != file_info.size {
            self.remove_temp(&temp).await;
            return Err(StorageError::SizeMismatch {
                declared: file_info.size,
                actual: meta.len(),
            });
        }

        if let Err(reason) = rules::check(file_info, &ext, meta.len(), rules) {
            self.remove_temp(&temp).await;
            return Err(StorageError::Validation(reason));
        }

        let final_name = Self::random_final_name(&ext);
        let final_path = self.root.join(&final_name);
        // Atomic within one filesystem. A concurrent assembler that already
        // renamed the temp file surfaces here as NotFound.
        fs::rename(&temp, &final_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::TempMissing(upload_id.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        // The random final name erases the original filename and mime type;
        // the sidecar carries them for downstream consumers. Its `hash`
        // field holds the final filename, matching the interface consumers
        // expect.
        let sidecar = serde_json::json!({
            "name": file_info.name,
            "type": file_info.content_type,
            "size": file_info.size,
            "hash": final_name,
        });
        let sidecar_path = self.root.join(format!("{final_name}.json"));
        if let Err(e) = fs::write(&sidecar_path, sidecar.to_string()).await {
            let _ = fs::remove_file(&final_path).await;
            return Err(StorageError::Io(e));
        }

        tracing::info!(
            upload_id = %upload_id,
            final_name = %final_name,
            size = file_info.size,
            "assembled upload"
        );
        Ok(final_name)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn cleanup(&self, upload_id: &str, ext: &str) {
        match self.temp_path(upload_id, ext) {
            Ok(path) => self.remove_temp(&path).await,
            Err(e) => tracing::warn!(upload_id = %upload_id, error = %e, "cleanup skipped"),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("uploads directory not accessible: {e}"),
            ))
        })?;
        if !meta.is_dir() {
            return Err(StorageError::Config(format!(
                "uploads path is not a directory: {:?}",
                self.root
            )));
        }
        Ok(())
    }
}

/// Sanitized extension from the declared filename.
fn ext_of(file_info: &FileInfo) -> String {
    sluice_core::sanitize::extension_of(&file_info.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, size: u64) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            size,
            hash: None,
        }
    }

    async fn writer() -> (tempfile::TempDir, FilesystemWriter) {
        let dir = tempfile::tempdir().unwrap();
        let writer = FilesystemWriter::new(dir.path()).await.unwrap();
        (dir, writer)
    }

    #[tokio::test]
    async fn out_of_order_chunks_assemble_byte_identical() {
        let (_dir, writer) = writer().await;
        let data: Vec<u8> = (0..100u8).collect();
        let id = "a".repeat(64);

        // 40-byte chunks submitted 2, 0, 1
        for index in [2u32, 0, 1] {
            let start = index as usize * 40;
            let end = (start + 40).min(data.len());
            writer
                .store_chunk(&id, index, Bytes::copy_from_slice(&data[start..end]), 40, "bin")
                .await
                .unwrap();
        }

        let final_name = writer
            .assemble(&id, &info("data.bin", 100), &UploadRules::default())
            .await
            .unwrap();
        assert_eq!(final_name.len(), 44); // 40 hex + ".bin"

        let assembled = fs::read(writer.final_path(&final_name)).await.unwrap();
        assert_eq!(assembled, data);
    }

    #[tokio::test]
    async fn store_chunk_is_idempotent() {
        let (_dir, writer) = writer().await;
        let id = "b".repeat(64);
        let chunk = Bytes::from_static(b"0123456789");

        writer.store_chunk(&id, 0, chunk.clone(), 10, "bin").await.unwrap();
        writer.store_chunk(&id, 1, chunk.clone(), 10, "bin").await.unwrap();
        let first = fs::read(writer.temp_path(&id, "bin").unwrap()).await.unwrap();

        writer.store_chunk(&id, 0, chunk, 10, "bin").await.unwrap();
        let second = fs::read(writer.temp_path(&id, "bin").unwrap()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn short_last_chunk_lands_at_canonical_offset() {
        let (_dir, writer) = writer().await;
        let id = "c".repeat(64);

        writer
            .store_chunk(&id, 1, Bytes::from_static(b"XY"), 8, "bin")
            .await
            .unwrap();
        writer
            .store_chunk(&id, 0, Bytes::from_static(b"ABCDEFGH"), 8, "bin")
            .await
            .unwrap();

        let bytes = fs::read(writer.temp_path(&id, "bin").unwrap()).await.unwrap();
        assert_eq!(&bytes, b"ABCDEFGHXY");
    }

    #[tokio::test]
    async fn assemble_rejects_length_mismatch_and_deletes_temp() {
        let (_dir, writer) = writer().await;
        let id = "d".repeat(64);
        writer
            .store_chunk(&id, 0, Bytes::from_static(b"12345"), 5, "bin")
            .await
            .unwrap();

        let err = writer
            .assemble(&id, &info("data.bin", 9), &UploadRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { declared: 9, actual: 5 }));
        assert!(!writer.temp_path(&id, "bin").unwrap().exists());
    }

    #[tokio::test]
    async fn assemble_rejects_missing_temp() {
        let (_dir, writer) = writer().await;
        let err = writer
            .assemble(&"e".repeat(64), &info("data.bin", 1), &UploadRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TempMissing(_)));
    }

    #[tokio::test]
    async fn assemble_enforces_ruleset_and_deletes_temp() {
        let (_dir, writer) = writer().await;
        let id = "f".repeat(64);
        writer
            .store_chunk(&id, 0, Bytes::from_static(b"MZ"), 2, "exe")
            .await
            .unwrap();

        let rules = UploadRules {
            allowed_extensions: vec!["pdf".to_string()],
            ..Default::default()
        };
        let err = writer
            .assemble(&id, &info("evil.exe", 2), &rules)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert!(!writer.temp_path(&id, "exe").unwrap().exists());
    }

    #[tokio::test]
    async fn assemble_writes_metadata_sidecar() {
        let (_dir, writer) = writer().await;
        let id = "1".repeat(64);
        writer
            .store_chunk(&id, 0, Bytes::from_static(b"%PDF"), 4, "pdf")
            .await
            .unwrap();

        let mut file_info = info("report.pdf", 4);
        file_info.content_type = "application/pdf".to_string();
        let final_name = writer
            .assemble(&id, &file_info, &UploadRules::default())
            .await
            .unwrap();

        let sidecar_path = writer.final_path(&format!("{final_name}.json"));
        let sidecar: serde_json::Value =
            serde_json::from_slice(&fs::read(sidecar_path).await.unwrap()).unwrap();
        assert_eq!(sidecar["name"], "report.pdf");
        assert_eq!(sidecar["type"], "application/pdf");
        assert_eq!(sidecar["size"], 4);
        assert_eq!(sidecar["hash"], final_name);
    }

    #[tokio::test]
    async fn traversal_in_upload_id_is_neutralized() {
        let (dir, writer) = writer().await;
        writer
            .store_chunk("../../escape", 0, Bytes::from_static(b"x"), 1, "bin")
            .await
            .unwrap();

        // The write landed inside the root under the sanitized name.
        assert!(dir.path().join("escape.bin").exists());
        assert!(!dir.path().parent().unwrap().join("escape.bin").exists());
    }

    #[tokio::test]
    async fn empty_sanitized_id_is_rejected() {
        let (_dir, writer) = writer().await;
        let err = writer
            .store_chunk("../..", 0, Bytes::from_static(b"x"), 1, "bin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Core(sluice_core::Error::InvalidUploadId(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_is_best_effort() {
        let (_dir, writer) = writer().await;
        let id = "2".repeat(64);
        writer
            .store_chunk(&id, 0, Bytes::from_static(b"x"), 1, "bin")
            .await
            .unwrap();

        writer.cleanup(&id, "bin").await;
        assert!(!writer.temp_path(&id, "bin").unwrap().exists());

        // Second cleanup of an absent file is silent.
        writer.cleanup(&id, "bin").await;
    }

    #[tokio::test]
    async fn zero_byte_file_assembles() {
        let (_dir, writer) = writer().await;
        let id = "3".repeat(64);
        // Touch the temp file with an empty write at offset 0.
        writer
            .store_chunk(&id, 0, Bytes::new(), 1, "bin")
            .await
            .unwrap();

        let final_name = writer
            .assemble(&id, &info("empty.bin", 0), &UploadRules::default())
            .await
            .unwrap();
        let meta = fs::metadata(writer.final_path(&final_name)).await.unwrap();
        assert_eq!(meta.len(), 0);
    }
}
