//! Application state shared across handlers.

use sluice_core::config::AppConfig;
use sluice_session::SessionStore;
use sluice_storage::ChunkWriter;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Session store: the source of truth for upload progress.
    pub sessions: Arc<dyn SessionStore>,
    /// Chunk writer backend.
    pub writer: Arc<dyn ChunkWriter>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails; a server with an invalid
    /// gate hash or chunking bounds must not come up.
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        writer: Arc<dyn ChunkWriter>,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }

        Self {
            config: Arc::new(config),
            sessions,
            writer,
        }
    }

    /// Session TTL from configuration.
    pub fn session_ttl(&self) -> time::Duration {
        self.config.chunking.session_ttl()
    }
}
