//! HTTP ingest service for the sluice chunked upload core.
//!
//! This crate provides the chunked upload control plane:
//! - Upload initiation (sizing decision + resumable session lookup)
//! - The multipart chunk ingest endpoint
//! - Server-side completion detection and idempotent finalization
//! - Session status queries
//! - Health and Prometheus metrics endpoints

pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
