//! Core domain types and shared logic for the sluice chunked upload core.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content, chunk and file hashes
//! - Upload ids and session records
//! - The chunk sizing policy
//! - Filename sanitization
//! - Configuration types

pub mod config;
pub mod error;
pub mod hash;
pub mod sanitize;
pub mod session;
pub mod sizing;

pub use config::{AppConfig, ChunkingConfig, SessionStoreConfig, StorageConfig, UploadRules};
pub use error::{Error, Result};
pub use hash::{ChunkHash, ContentHash, FileHash};
pub use session::{FileInfo, SessionRecord, UploadId};
pub use sizing::{ChunkPlan, plan};
