//! Upload session types and lifecycle.

use crate::hash::FileHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Unique identifier for an upload session: 64 lowercase hex characters
/// from 32 cryptographically random bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadId(String);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Parse from a string, requiring exactly 64 hex characters.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            let shown: String = s.chars().take(80).collect();
            return Err(crate::Error::InvalidUploadId(format!(
                "expected 64 hex chars, got {shown:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for UploadId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<UploadId> for String {
    fn from(value: UploadId) -> Self {
        value.0
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", &self.0[..16])
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File metadata as declared by the client at initiation.
///
/// `size` is authoritative for the total byte count. `hash` is the
/// client-computed fingerprint of the whole file and the resumability key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Original filename.
    pub name: String,
    /// Declared MIME type.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Declared total size in bytes.
    pub size: u64,
    /// Whole-file SHA-256 fingerprint, if the client computed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<FileHash>,
}

/// The server-side record of one in-flight chunked upload.
///
/// The copy held by any one request is a stale snapshot; the session store
/// is the sole source of truth for `received_chunks`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub upload_id: UploadId,
    /// Client-declared file metadata.
    pub file_info: FileInfo,
    /// Bytes per chunk (the last chunk may be shorter).
    pub chunk_size: u64,
    /// Total number of chunks: ceil(size / chunk_size).
    pub total_chunks: u32,
    /// Indices acknowledged as durably persisted, sorted ascending.
    /// Membership is the truth; ordering is irrelevant to correctness.
    pub received_chunks: Vec<u32>,
    /// Set once assembly and validation succeed.
    pub complete: bool,
    /// Final path relative to the uploads directory, set iff `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_path: Option<String>,
    /// Creation time, used for expiry accounting.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl SessionRecord {
    /// Create a new open session.
    pub fn new(file_info: FileInfo, chunk_size: u64, total_chunks: u32) -> Self {
        Self {
            upload_id: UploadId::new(),
            file_info,
            chunk_size,
            total_chunks,
            received_chunks: Vec::new(),
            complete: false,
            final_path: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether a chunk index has been acknowledged.
    pub fn has_chunk(&self, index: u32) -> bool {
        self.received_chunks.binary_search(&index).is_ok()
    }

    /// Record a chunk index as received, keeping the set sorted and
    /// deduplicated. Returns false if the index was already present.
    pub fn mark_received(&mut self, index: u32) -> crate::Result<bool> {
        if index >= self.total_chunks {
            return Err(crate::Error::InvalidChunkIndex {
                index,
                total: self.total_chunks,
            });
        }
        match self.received_chunks.binary_search(&index) {
            Ok(_) => Ok(false),
            Err(pos) => {
                self.received_chunks.insert(pos, index);
                Ok(true)
            }
        }
    }

    /// Number of acknowledged chunks.
    pub fn received_count(&self) -> u32 {
        self.received_chunks.len() as u32
    }

    /// Whether every chunk has been acknowledged.
    pub fn is_fully_received(&self) -> bool {
        self.received_count() == self.total_chunks
    }

    /// Upload progress as a percentage of chunks received.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 100.0;
        }
        f64::from(self.received_count()) / f64::from(self.total_chunks) * 100.0
    }

    /// Byte length of the chunk at `index` given the declared file size.
    pub fn chunk_len(&self, index: u32) -> u64 {
        let start = u64::from(index) * self.chunk_size;
        self.file_info.size.saturating_sub(start).min(self.chunk_size)
    }
}
