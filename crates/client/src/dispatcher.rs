//! Chunk dispatcher: slices files, hashes chunks and uploads them with
//! bounded concurrency, retry and cancellation.

use crate::api::{
    HashMismatchResponse, IngestResponse, InitiateRequest, InitiateResponse, UploadStatusResponse,
};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use sluice_core::hash::{ChunkHash, ContentHash};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

/// Dispatcher errors. Transient conditions (hash mismatch, transport
/// failures, server write failures) are retried internally and never
/// surface; everything here is terminal for the upload.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("server declined the chunked path for {0}")]
    Declined(String),

    #[error("chunk {chunk_index} failed after {attempts} attempts")]
    RetriesExhausted { chunk_index: u32, attempts: u32 },

    #[error("upload session error: {0}")]
    Session(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("unexpected server response: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Tuning knobs for the dispatcher.
#[derive(Clone, Debug)]
pub struct DispatcherOptions {
    /// Maximum chunk uploads in flight per file.
    pub parallelism: usize,
    /// Per-chunk retry budget.
    pub max_retries: u32,
    /// Base delay for the exponential backoff, in milliseconds. The n-th
    /// retry waits `2^n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

/// Outcome of one finished file upload.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub upload_id: String,
    /// Final path relative to the server's uploads directory.
    pub final_path: String,
}

/// Outcome of a whole batch, handed to the enclosing framework.
#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub upload_ids: Vec<String>,
    pub multi_file: bool,
}

enum ChunkStatus {
    /// Acknowledged; carries the final path if this was the completing chunk.
    Done(Option<String>),
    /// Transient failure worth retrying.
    Retry(String),
    /// Terminal failure.
    Fatal(DispatchError),
}

/// Uploads files to the chunk ingest endpoint.
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    gate_token: Option<String>,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Create a dispatcher for the given server.
    pub fn new(base_url: &str, gate_token: Option<String>, options: DispatcherOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            gate_token,
            options,
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.gate_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Ask the server for the upload strategy, opening or resuming a session.
    pub async fn initiate(&self, request: &InitiateRequest) -> DispatchResult<InitiateResponse> {
        let url = format!("{}/v1/uploads", self.base_url);
        let response = self.authed(self.http.post(&url).json(request)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Protocol(format!(
                "initiate failed ({status}): {body}"
            )));
        }
        Ok(response.json().await?)
    }

    /// Upload one file, chunked, reporting progress as chunks are
    /// acknowledged. Returns the server's final path.
    pub async fn upload_file(
        &self,
        path: &Path,
        content_type: &str,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u32, u32) + Send + Sync),
    ) -> DispatchResult<UploadOutcome> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let size = tokio::fs::metadata(path).await?.len();
        let file_hash = hash_file(path).await?;

        let initiate = self
            .initiate(&InitiateRequest {
                name: name.clone(),
                content_type: content_type.to_string(),
                size,
                hash: Some(file_hash),
            })
            .await?;

        if !initiate.should_chunk {
            return Err(DispatchError::Declined(name));
        }
        let upload_id = initiate
            .upload_id
            .ok_or_else(|| DispatchError::Protocol("missing upload_id".to_string()))?;
        let chunk_size = initiate
            .chunk_size
            .ok_or_else(|| DispatchError::Protocol("missing chunk_size".to_string()))?;
        let total_chunks = initiate
            .total_chunks
            .ok_or_else(|| DispatchError::Protocol("missing total_chunks".to_string()))?;
        let received = initiate.received_chunks.unwrap_or_default();

        let pending = pending_indices(total_chunks, &received);
        tracing::debug!(
            upload_id = %upload_id,
            total_chunks,
            pending = pending.len(),
            "dispatching chunks"
        );

        let uploaded = AtomicU32::new(received.len() as u32);
        let mut final_path: Option<String> = None;
        let mut in_flight = FuturesUnordered::new();
        let parallel = self.options.parallelism.max(1);

        let mut report = |done: Option<String>| {
            let count = uploaded.fetch_add(1, Ordering::SeqCst) + 1;
            on_progress(count.min(total_chunks), total_chunks);
            if let Some(path) = done {
                final_path = Some(path);
            }
        };

        for index in pending {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            let data = read_chunk(path, index, chunk_size, size).await?;
            in_flight.push(self.send_chunk(upload_id.clone(), index, data, cancel));

            if in_flight.len() >= parallel
                && let Some(result) = in_flight.next().await
            {
                report(result?);
            }
        }

        while let Some(result) = in_flight.next().await {
            report(result?);
        }

        // Every chunk is acknowledged. The completing response carried the
        // final path; if this run only re-sent already-received chunks, ask
        // the server for it.
        let final_path = match final_path {
            Some(path) => path,
            None => self.fetch_final_path(&upload_id).await?,
        };

        Ok(UploadOutcome {
            upload_id,
            final_path,
        })
    }

    /// Upload a batch of files and summarize it for the framework.
    pub async fn upload_batch(
        &self,
        files: &[(std::path::PathBuf, String)],
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(&Path, u32, u32) + Send + Sync),
    ) -> DispatchResult<BatchOutcome> {
        let mut upload_ids = Vec::with_capacity(files.len());
        for (path, content_type) in files {
            let outcome = self
                .upload_file(path, content_type, cancel, &|done, total| {
                    on_progress(path, done, total)
                })
                .await?;
            upload_ids.push(outcome.upload_id);
        }
        Ok(BatchOutcome {
            upload_ids,
            multi_file: files.len() > 1,
        })
    }

    /// Submit one chunk, retrying transient failures with exponential
    /// backoff until the retry budget runs out.
    async fn send_chunk(
        &self,
        upload_id: String,
        index: u32,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> DispatchResult<Option<String>> {
        let chunk_hash = ChunkHash::compute(&data).to_hex();
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                result = self.post_chunk(&upload_id, index, &data, &chunk_hash) => result,
            };

            let reason = match outcome {
                Ok(ChunkStatus::Done(path)) => return Ok(path),
                Ok(ChunkStatus::Fatal(err)) => return Err(err),
                Ok(ChunkStatus::Retry(reason)) => reason,
                Err(e) => format!("transport error: {e}"),
            };

            attempt += 1;
            if attempt > self.options.max_retries {
                tracing::warn!(
                    upload_id = %upload_id,
                    chunk_index = index,
                    attempts = attempt,
                    "chunk retry budget exhausted"
                );
                return Err(DispatchError::RetriesExhausted {
                    chunk_index: index,
                    attempts: attempt,
                });
            }

            let delay = Duration::from_millis(
                self.options
                    .base_delay_ms
                    .saturating_mul(1u64 << (attempt - 1).min(16)),
            );
            tracing::debug!(
                upload_id = %upload_id,
                chunk_index = index,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "retrying chunk"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn post_chunk(
        &self,
        upload_id: &str,
        index: u32,
        data: &[u8],
        chunk_hash: &str,
    ) -> reqwest::Result<ChunkStatus> {
        let form = reqwest::multipart::Form::new()
            .text("upload_id", upload_id.to_string())
            .text("chunk_index", index.to_string())
            .text("chunk_hash", chunk_hash.to_string())
            .part(
                "chunk_data",
                reqwest::multipart::Part::bytes(data.to_vec()).file_name("blob"),
            );

        let url = format!("{}/v1/uploads/chunk", self.base_url);
        let response = self
            .authed(self.http.post(&url).multipart(form))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: IngestResponse = response.json().await?;
            return Ok(ChunkStatus::Done(body.complete.then_some(body.path).flatten()));
        }

        if status == reqwest::StatusCode::CONFLICT {
            // Integrity retry signal. A mismatched index would mean the
            // server is answering someone else's question.
            let body = response.text().await.unwrap_or_default();
            return Ok(match serde_json::from_str::<HashMismatchResponse>(&body) {
                Ok(mismatch) if mismatch.chunk_index == index => {
                    ChunkStatus::Retry(format!("hash mismatch for chunk {index}"))
                }
                _ => ChunkStatus::Fatal(DispatchError::Protocol(format!(
                    "conflict for another chunk: {body}"
                ))),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(ChunkStatus::Fatal(DispatchError::Session(
                "upload session not found or expired".to_string(),
            )));
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            // Write failures are transient from the client's point of view.
            return Ok(ChunkStatus::Retry(format!("server error ({status})")));
        }
        Ok(ChunkStatus::Fatal(DispatchError::Protocol(format!(
            "chunk upload failed ({status}): {body}"
        ))))
    }

    async fn fetch_final_path(&self, upload_id: &str) -> DispatchResult<String> {
        let url = format!("{}/v1/uploads/{upload_id}", self.base_url);
        let response = self.authed(self.http.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Protocol(format!(
                "status query failed ({status}): {body}"
            )));
        }
        let body: UploadStatusResponse = response.json().await?;
        body.path
            .filter(|_| body.complete)
            .ok_or_else(|| DispatchError::Protocol("upload not complete on server".to_string()))
    }
}

/// Compute the indices this run must send: all missing chunks, preceded by
/// a re-send of the last acknowledged one. The server acks only after
/// fsync, but a crash between the client sending and the server finishing
/// could leave a torn tail; repeating one chunk is cheap and idempotent.
pub fn pending_indices(total_chunks: u32, received: &[u32]) -> Vec<u32> {
    let mut pending = Vec::new();
    if let Some(last) = received.iter().max() {
        pending.push(*last);
    }
    pending.extend((0..total_chunks).filter(|i| !received.contains(i)));
    pending
}

/// Read the canonical byte range of one chunk.
async fn read_chunk(
    path: &Path,
    index: u32,
    chunk_size: u64,
    file_size: u64,
) -> DispatchResult<Vec<u8>> {
    let start = u64::from(index) * chunk_size;
    let len = file_size.saturating_sub(start).min(chunk_size) as usize;

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Stream-hash a whole file (the resumability fingerprint).
async fn hash_file(path: &Path) -> DispatchResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = ContentHash::hasher();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex())
}
