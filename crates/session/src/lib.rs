//! Upload session store for the sluice chunked upload core.
//!
//! The session record is the shared truth for an in-flight upload: any
//! worker handling any chunk reads and writes it here. This crate provides:
//! - The `SessionStore` trait (plain KV with TTL, no compare-and-swap)
//! - An in-process store for tests and single-worker deployments
//! - A SQLite store shared by workers on one host

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{SessionError, SessionResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::SessionStore;

use sluice_core::config::SessionStoreConfig;
use std::sync::Arc;

/// Create a session store from configuration.
pub async fn from_config(config: &SessionStoreConfig) -> SessionResult<Arc<dyn SessionStore>> {
    match config {
        SessionStoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        SessionStoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
    }
}
