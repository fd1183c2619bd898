//! Upload session control plane handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{UPLOAD_SESSIONS_CREATED, UPLOAD_SESSIONS_RESUMED};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use sluice_core::session::{FileInfo, SessionRecord, UploadId};
use sluice_core::sizing::{self, ChunkPlan};

/// Response to an upload initiation request.
#[derive(Debug, Serialize)]
pub struct InitiateUploadResponse {
    /// Whether the file should take the chunked path. When false the
    /// caller falls back to the ordinary single-request upload.
    pub should_chunk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    /// Chunk indices already persisted for a resumed session; empty for a
    /// fresh upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_chunks: Option<Vec<u32>>,
}

impl InitiateUploadResponse {
    fn declined() -> Self {
        Self {
            should_chunk: false,
            upload_id: None,
            chunk_size: None,
            total_chunks: None,
            received_chunks: None,
        }
    }

    fn from_record(record: &SessionRecord) -> Self {
        Self {
            should_chunk: true,
            upload_id: Some(record.upload_id.to_string()),
            chunk_size: Some(record.chunk_size),
            total_chunks: Some(record.total_chunks),
            received_chunks: Some(record.received_chunks.clone()),
        }
    }
}

/// POST /v1/uploads - Decide the strategy for a file and open (or resume)
/// a session.
#[tracing::instrument(skip(state, file_info), fields(name = %file_info.name, size = file_info.size))]
pub async fn initiate_upload(
    State(state): State<AppState>,
    Json(file_info): Json<FileInfo>,
) -> ApiResult<(StatusCode, Json<InitiateUploadResponse>)> {
    if file_info.name.is_empty() {
        return Err(ApiError::Unprocessable("file name is empty".to_string()));
    }

    let plan = match sizing::plan(
        file_info.size,
        &state.config.chunking,
        state.config.storage.is_local(),
    ) {
        Ok(plan) => plan,
        Err(sluice_core::Error::Configuration(msg)) => {
            // Chunking is enabled but the backend can't carry it; the
            // ordinary upload path still can.
            tracing::warn!(reason = %msg, "declining chunked upload");
            return Ok((StatusCode::OK, Json(InitiateUploadResponse::declined())));
        }
        Err(e) => return Err(e.into()),
    };

    let (chunk_size, total_chunks) = match plan {
        ChunkPlan::Single => {
            return Ok((StatusCode::OK, Json(InitiateUploadResponse::declined())));
        }
        ChunkPlan::Chunked {
            chunk_size,
            total_chunks,
        } => (chunk_size, total_chunks),
    };

    // Resumability: a prior session for the same file fingerprint is handed
    // back so the client can skip chunks already persisted. The declared
    // size must match; a different file behind the same hash claim, or a
    // finished session, gets a fresh id.
    if let Some(hash) = &file_info.hash
        && let Some(existing) = state.sessions.find_by_file_hash(hash).await?
        && !existing.complete
        && existing.file_info.size == file_info.size
    {
        UPLOAD_SESSIONS_RESUMED.inc();
        tracing::info!(
            upload_id = %existing.upload_id,
            received = existing.received_count(),
            "resumed existing upload session"
        );
        return Ok((
            StatusCode::OK,
            Json(InitiateUploadResponse::from_record(&existing)),
        ));
    }

    let record = SessionRecord::new(file_info, chunk_size, total_chunks);
    state.sessions.put(&record, state.session_ttl()).await?;

    UPLOAD_SESSIONS_CREATED.inc();
    tracing::info!(
        upload_id = %record.upload_id,
        chunk_size,
        total_chunks,
        "created upload session"
    );

    Ok((
        StatusCode::CREATED,
        Json(InitiateUploadResponse::from_record(&record)),
    ))
}

/// Response to a session status query.
#[derive(Debug, Serialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    pub received_chunks: Vec<u32>,
    pub progress: f64,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// GET /v1/uploads/{upload_id} - Query session state.
#[tracing::instrument(skip(state))]
pub async fn get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadStatusResponse>> {
    let upload_id = UploadId::parse(&upload_id)
        .map_err(|e| ApiError::Unprocessable(format!("invalid upload id: {e}")))?;

    let record = state
        .sessions
        .get(&upload_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("upload session not found".to_string()))?;

    Ok(Json(UploadStatusResponse {
        upload_id: record.upload_id.to_string(),
        chunk_size: record.chunk_size,
        total_chunks: record.total_chunks,
        progress: record.progress_percent(),
        received_chunks: record.received_chunks.clone(),
        complete: record.complete,
        path: record.final_path,
    }))
}
