//! Server test utilities.

use sluice_core::config::AppConfig;
use sluice_core::session::SessionRecord;
use sluice_server::{AppState, create_router};
use sluice_session::{MemoryStore, SessionStore};
use sluice_storage::{ChunkWriter, FilesystemWriter, UnsupportedWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    uploads_dir: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let uploads_dir = temp_dir.path().join("uploads");

        let mut config = AppConfig::for_testing(&uploads_dir);
        modifier(&mut config);

        let writer: Arc<dyn ChunkWriter> = if config.storage.is_local() {
            Arc::new(
                FilesystemWriter::new(&uploads_dir)
                    .await
                    .expect("failed to create chunk writer"),
            )
        } else {
            Arc::new(UnsupportedWriter::new("s3"))
        };

        let sessions: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, sessions, writer);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            uploads_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Insert a session record directly into the store.
    pub async fn seed_session(&self, record: &SessionRecord) {
        self.state
            .sessions
            .put(record, self.state.session_ttl())
            .await
            .expect("failed to seed session");
    }

    /// Path of the uploads directory.
    pub fn uploads_dir(&self) -> &PathBuf {
        &self.uploads_dir
    }

    /// All non-temp entries currently in the uploads directory.
    pub fn finalized_files(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.uploads_dir) {
            for entry in entries.flatten() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        names
    }
}
