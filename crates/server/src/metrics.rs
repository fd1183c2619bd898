//! Prometheus metrics for the sluice server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping;
//! restrict it to authorized scraper IPs at the infrastructure level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static UPLOAD_SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_upload_sessions_created_total",
        "Total number of upload sessions created",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_RESUMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_upload_sessions_resumed_total",
        "Total number of upload sessions resumed via file fingerprint",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_upload_sessions_completed_total",
        "Total number of uploads assembled and finalized",
    )
    .expect("metric creation failed")
});

pub static CHUNKS_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_chunks_ingested_total",
        "Total number of chunks durably written and acknowledged",
    )
    .expect("metric creation failed")
});

pub static CHUNK_HASH_MISMATCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_chunk_hash_mismatches_total",
        "Total number of chunks rejected for hash mismatch",
    )
    .expect("metric creation failed")
});

pub static BYTES_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("sluice_bytes_ingested_total", "Total chunk bytes ingested")
        .expect("metric creation failed")
});

pub static RMW_CONFLICTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sluice_session_rmw_conflicts_total",
        "Read-modify-write verify failures that triggered a retry",
    )
    .expect("metric creation failed")
});

pub static CHUNK_INGEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "sluice_chunk_ingest_duration_seconds",
        "Wall-clock time to validate, write and record one chunk",
    ))
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let registry = &*REGISTRY;
        registry
            .register(Box::new(UPLOAD_SESSIONS_CREATED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(UPLOAD_SESSIONS_RESUMED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(UPLOAD_SESSIONS_COMPLETED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(CHUNKS_INGESTED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(CHUNK_HASH_MISMATCHES.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(BYTES_INGESTED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(RMW_CONFLICTS.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(CHUNK_INGEST_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", prometheus::TEXT_FORMAT)],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
