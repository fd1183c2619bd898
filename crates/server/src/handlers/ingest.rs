//! Chunk ingest handler.
//!
//! The hot path of the service: every chunk of every upload lands here, on
//! whichever worker the load balancer picked. The session store is the only
//! coordination point; the handler supplies the safety the store's plain
//! KV contract lacks via a read-modify-write-with-verify loop.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    BYTES_INGESTED, CHUNK_HASH_MISMATCHES, CHUNK_INGEST_DURATION, CHUNKS_INGESTED, RMW_CONFLICTS,
    UPLOAD_SESSIONS_COMPLETED,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use sluice_core::hash::ChunkHash;
use sluice_core::sanitize;
use sluice_core::session::{SessionRecord, UploadId};
use sluice_storage::StorageError;
use std::time::Instant;

/// Partial progress response.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: f64,
    pub received: u32,
    pub total: u32,
}

/// Completion response carrying the final path relative to the uploads
/// directory.
#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub complete: bool,
    pub path: String,
}

/// One parsed chunk submission.
struct ChunkUpload {
    upload_id: UploadId,
    chunk_index: u32,
    chunk_data: Bytes,
    chunk_hash: ChunkHash,
}

/// POST /v1/uploads/chunk - Ingest one chunk.
#[tracing::instrument(skip(state, multipart))]
pub async fn ingest_chunk(
    State(state): State<AppState>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> ApiResult<Response> {
    let start = Instant::now();
    let multipart =
        multipart.map_err(|e| ApiError::Unprocessable(format!("expected multipart body: {e}")))?;
    let upload = parse_chunk_upload(multipart).await?;

    let session = state
        .sessions
        .get(&upload.upload_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("upload session not found".to_string()))?;

    // Late chunk after finalization: answer with the winner's path.
    if session.complete {
        return complete_response(&session);
    }

    // Per-chunk integrity. A mismatch is the retry signal: the bytes were
    // mangled in transit, nothing is written.
    let actual = ChunkHash::compute(&upload.chunk_data);
    if actual != upload.chunk_hash {
        CHUNK_HASH_MISMATCHES.inc();
        tracing::warn!(
            upload_id = %upload.upload_id,
            chunk_index = upload.chunk_index,
            expected = %upload.chunk_hash,
            actual = %actual,
            "chunk hash verification failed"
        );
        return Err(ApiError::HashMismatch {
            chunk_index: upload.chunk_index,
        });
    }

    if upload.chunk_index >= session.total_chunks {
        return Err(ApiError::Unprocessable(format!(
            "chunk index {} out of range (total {})",
            upload.chunk_index, session.total_chunks
        )));
    }

    // The declared size is authoritative; a payload that is not exactly the
    // canonical slice for this index would corrupt byte ranges around it.
    let expected_len = session.chunk_len(upload.chunk_index);
    if upload.chunk_data.len() as u64 != expected_len {
        return Err(ApiError::Unprocessable(format!(
            "chunk {} is {} bytes, expected {}",
            upload.chunk_index,
            upload.chunk_data.len(),
            expected_len
        )));
    }

    let ext = sanitize::extension_of(&session.file_info.name);
    let chunk_len = upload.chunk_data.len() as u64;
    state
        .writer
        .store_chunk(
            upload.upload_id.as_str(),
            upload.chunk_index,
            upload.chunk_data,
            session.chunk_size,
            &ext,
        )
        .await?;

    // The bytes are durable; now make the index visible to every worker.
    let record = mark_chunk_received(&state, &upload.upload_id, upload.chunk_index).await?;

    CHUNKS_INGESTED.inc();
    BYTES_INGESTED.inc_by(chunk_len);
    CHUNK_INGEST_DURATION.observe(start.elapsed().as_secs_f64());
    tracing::debug!(
        upload_id = %upload.upload_id,
        chunk_index = upload.chunk_index,
        received = record.received_count(),
        total = record.total_chunks,
        "chunk ingested"
    );

    if record.complete {
        return complete_response(&record);
    }
    if record.is_fully_received() {
        return finalize_upload(&state, record).await;
    }

    Ok(Json(ProgressResponse {
        progress: record.progress_percent(),
        received: record.received_count(),
        total: record.total_chunks,
    })
    .into_response())
}

/// Extract and shape-check the four multipart fields.
async fn parse_chunk_upload(mut multipart: Multipart) -> ApiResult<ChunkUpload> {
    let mut upload_id: Option<String> = None;
    let mut chunk_index: Option<String> = None;
    let mut chunk_data: Option<Bytes> = None;
    let mut chunk_hash: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Unprocessable(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "upload_id" => upload_id = Some(read_text(field).await?),
            "chunk_index" => chunk_index = Some(read_text(field).await?),
            "chunk_hash" => chunk_hash = Some(read_text(field).await?),
            "chunk_data" => {
                chunk_data = Some(field.bytes().await.map_err(|e| {
                    ApiError::Unprocessable(format!("failed to read chunk_data: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let upload_id = upload_id
        .ok_or_else(|| ApiError::Unprocessable("missing field upload_id".to_string()))?;
    let chunk_index = chunk_index
        .ok_or_else(|| ApiError::Unprocessable("missing field chunk_index".to_string()))?;
    let chunk_data = chunk_data
        .ok_or_else(|| ApiError::Unprocessable("missing field chunk_data".to_string()))?;
    let chunk_hash = chunk_hash
        .ok_or_else(|| ApiError::Unprocessable("missing field chunk_hash".to_string()))?;

    let upload_id = UploadId::parse(&upload_id)
        .map_err(|e| ApiError::Unprocessable(format!("invalid upload_id: {e}")))?;
    let chunk_index: u32 = chunk_index
        .parse()
        .map_err(|e| ApiError::Unprocessable(format!("invalid chunk_index: {e}")))?;
    let chunk_hash = ChunkHash::from_hex(&chunk_hash)
        .map_err(|e| ApiError::Unprocessable(format!("invalid chunk_hash: {e}")))?;

    Ok(ChunkUpload {
        upload_id,
        chunk_index,
        chunk_data,
        chunk_hash,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::Unprocessable(format!("failed to read field {name}: {e}")))
}

/// Record a chunk index in the session store.
///
/// The store has no compare-and-swap, so two workers adding different
/// indices may overwrite each other. The loop re-reads after writing and
/// verifies its index survived; a lost update backs off `2^attempt` ms and
/// retries up to the configured attempt budget. Whatever interleaving
/// occurs, an index is only ever reported once it is visible in the store.
async fn mark_chunk_received(
    state: &AppState,
    upload_id: &UploadId,
    chunk_index: u32,
) -> ApiResult<SessionRecord> {
    let max_attempts = state.config.chunking.retry_attempts;
    let ttl = state.session_ttl();
    let mut attempt: u32 = 0;

    loop {
        let mut record = state
            .sessions
            .get(upload_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("upload session expired".to_string()))?;

        if record.complete || record.has_chunk(chunk_index) {
            return Ok(record);
        }

        record
            .mark_received(chunk_index)
            .map_err(|e| ApiError::Unprocessable(e.to_string()))?;
        state.sessions.put(&record, ttl).await?;

        let verified = state
            .sessions
            .get(upload_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("upload session expired".to_string()))?;
        if verified.has_chunk(chunk_index) {
            return Ok(verified);
        }

        // A concurrent writer clobbered the update.
        RMW_CONFLICTS.inc();
        if attempt >= max_attempts {
            return Err(ApiError::Internal(format!(
                "chunk {chunk_index} not visible in session after {max_attempts} retries"
            )));
        }
        tokio::time::sleep(std::time::Duration::from_millis(1u64 << attempt.min(10))).await;
        attempt += 1;
    }
}

/// Assemble and finalize an upload whose chunk set is complete.
///
/// Idempotent under concurrency: the rename inside `assemble` is atomic, so
/// the first finalizer wins; a loser finds the temp file gone, re-reads the
/// session and returns the winner's path.
async fn finalize_upload(state: &AppState, record: SessionRecord) -> ApiResult<Response> {
    let rules = &state.config.chunking.rules;
    let ext = sanitize::extension_of(&record.file_info.name);

    // Cap check from the declared size, before any assembly work.
    if record.file_info.size > rules.max_size_bytes {
        state.writer.cleanup(record.upload_id.as_str(), &ext).await;
        state.sessions.delete(&record.upload_id).await?;
        return Err(ApiError::SizeExceeded {
            declared: record.file_info.size,
            cap: rules.max_size_bytes,
        });
    }

    match state
        .writer
        .assemble(record.upload_id.as_str(), &record.file_info, rules)
        .await
    {
        Ok(final_name) => {
            let mut updated = record;
            updated.complete = true;
            updated.final_path = Some(final_name.clone());
            state.sessions.put(&updated, state.session_ttl()).await?;

            UPLOAD_SESSIONS_COMPLETED.inc();
            tracing::info!(
                upload_id = %updated.upload_id,
                path = %final_name,
                size = updated.file_info.size,
                "upload finalized"
            );
            Ok(Json(CompleteResponse {
                complete: true,
                path: final_name,
            })
            .into_response())
        }
        Err(StorageError::TempMissing(_)) => {
            // Lost the finalization race. The winner's session write may
            // still be in flight; poll briefly for it.
            let max_attempts = state.config.chunking.retry_attempts;
            for attempt in 0..=max_attempts {
                if let Some(current) = state.sessions.get(&record.upload_id).await?
                    && current.complete
                {
                    return complete_response(&current);
                }
                tokio::time::sleep(std::time::Duration::from_millis(1u64 << attempt.min(10)))
                    .await;
            }
            Err(ApiError::Internal(
                "temp file missing and no finalized session found".to_string(),
            ))
        }
        Err(e @ (StorageError::Validation(_) | StorageError::SizeMismatch { .. })) => {
            // The writer already deleted the temp file; the session is
            // terminal for this upload.
            tracing::warn!(upload_id = %record.upload_id, error = %e, "assembly rejected");
            state.sessions.delete(&record.upload_id).await?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn complete_response(record: &SessionRecord) -> ApiResult<Response> {
    match &record.final_path {
        Some(path) => Ok(Json(CompleteResponse {
            complete: true,
            path: path.clone(),
        })
        .into_response()),
        None => Err(ApiError::Internal(
            "session marked complete without a final path".to_string(),
        )),
    }
}
