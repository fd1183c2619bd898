//! Route configuration.

use crate::gate::gate_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Headroom over the largest chunk for multipart framing.
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Chunk bodies can reach max_chunk_kb; axum's default 2 MiB body cap
    // would reject them.
    let body_limit = state.config.chunking.max_chunk_kb as usize * 1024 + BODY_LIMIT_OVERHEAD;

    let upload_routes = Router::new()
        .route("/v1/uploads", post(handlers::initiate_upload))
        .route("/v1/uploads/chunk", post(handlers::ingest_chunk))
        .route("/v1/uploads/{upload_id}", get(handlers::get_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        // The gate guards the upload surface only; health and metrics stay
        // reachable for probes and scrapers.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate_middleware,
        ));

    let mut router = Router::new()
        .merge(upload_routes)
        .route("/v1/health", get(handlers::health_check));

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
