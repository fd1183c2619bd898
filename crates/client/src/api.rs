//! Wire types mirrored from the server.

use serde::{Deserialize, Serialize};

/// Body of an initiation request.
#[derive(Debug, Serialize)]
pub struct InitiateRequest {
    /// Original filename.
    pub name: String,
    /// Declared MIME type.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Total size in bytes.
    pub size: u64,
    /// Whole-file SHA-256 fingerprint (the resumability key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Response to an initiation request.
#[derive(Debug, Deserialize)]
pub struct InitiateResponse {
    pub should_chunk: bool,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub total_chunks: Option<u32>,
    #[serde(default)]
    pub received_chunks: Option<Vec<u32>>,
}

/// Successful response to a chunk submission: either partial progress or
/// the completion notice carrying the final path.
#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub received: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Body of a 409 hash-mismatch response: the retry signal.
#[derive(Debug, Deserialize)]
pub struct HashMismatchResponse {
    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,
}

/// Response to a session status query.
#[derive(Debug, Deserialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    pub received_chunks: Vec<u32>,
    pub progress: f64,
    pub complete: bool,
    #[serde(default)]
    pub path: Option<String>,
}
