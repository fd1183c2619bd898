//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, restrict the endpoint to authorized scraper IPs at the
    /// infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Request gate configuration.
///
/// The upload routes sit behind an opaque gate: requests must present a
/// bearer secret whose SHA-256 matches `token_hash`. The enclosing
/// framework's signed-URL machinery is expected to sit in front of this
/// service; the gate is the fixed 401 contract at this boundary. Leaving
/// `token_hash` unset disables the gate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Pre-computed hash of the gate secret (SHA-256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret" | sha256sum`
    #[serde(default)]
    pub token_hash: Option<String>,
}

impl GateConfig {
    /// Validate gate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(hash) = &self.token_hash
            && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err("gate.token_hash must be 64 hex characters (SHA-256)".to_string());
        }
        Ok(())
    }
}

/// Validation ruleset applied to the assembled file.
///
/// Empty allow-lists accept everything; the size cap always applies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadRules {
    /// Maximum declared/assembled file size in bytes.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Allowed MIME types (exact match on the declared type).
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
    /// Allowed file extensions (compared after sanitization, without dot).
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

fn default_max_size_bytes() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GiB
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            allowed_mime_types: Vec::new(),
            allowed_extensions: Vec::new(),
        }
    }
}

/// Chunked upload configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Master switch for the chunked upload path.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ceiling of the chunk sizing curve, in KiB.
    #[serde(default = "default_max_chunk_kb")]
    pub max_chunk_kb: u64,
    /// Files yielding fewer chunks than this go through the ordinary path.
    #[serde(default = "default_min_chunks")]
    pub min_chunks: u32,
    /// Session store TTL in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Retry budget, shared by the server-side read-modify-write loop and
    /// the client-side per-chunk retries.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Validation ruleset for the assembled file.
    #[serde(default)]
    pub rules: UploadRules,
}

fn default_enabled() -> bool {
    true
}

fn default_max_chunk_kb() -> u64 {
    64 * 1024 // 64 MiB ceiling
}

fn default_min_chunks() -> u32 {
    3
}

fn default_session_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_retry_attempts() -> u32 {
    3
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_chunk_kb: default_max_chunk_kb(),
            min_chunks: default_min_chunks(),
            session_ttl_secs: default_session_ttl_secs(),
            retry_attempts: default_retry_attempts(),
            rules: UploadRules::default(),
        }
    }
}

impl ChunkingConfig {
    /// Get the session TTL as a Duration.
    pub fn session_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Validate chunking configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_chunks == 0 {
            return Err("chunking.min_chunks must be at least 1".to_string());
        }
        if self.max_chunk_kb < crate::sizing::MIN_CHUNK_KB {
            return Err(format!(
                "chunking.max_chunk_kb {} is below the {} KiB floor",
                self.max_chunk_kb,
                crate::sizing::MIN_CHUNK_KB
            ));
        }
        Ok(())
    }
}

/// Storage backend configuration.
///
/// Chunked uploads are only supported on a local filesystem; a remote
/// backend is recognized here so it can be refused cleanly rather than
/// misparsed, and so the enclosing framework can still route non-chunked
/// uploads to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Uploads directory: temp files, final files and sidecars.
        path: PathBuf,
    },
    /// S3-compatible storage (refused for chunked uploads).
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// Region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/uploads"),
        }
    }
}

impl StorageConfig {
    /// Whether this backend is a local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Filesystem { .. })
    }
}

/// Session store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionStoreConfig {
    /// In-process store. Sessions do not survive a restart and are not
    /// shared across server processes; suitable for tests and single-worker
    /// deployments only.
    Memory,
    /// SQLite-backed store shared by workers on one host.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/sessions.db"),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Request gate configuration.
    #[serde(default)]
    pub gate: GateConfig,
    /// Chunked upload configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session store configuration.
    #[serde(default)]
    pub session_store: SessionStoreConfig,
}

impl AppConfig {
    /// Validate the whole configuration, failing fast on invalid settings.
    pub fn validate(&self) -> Result<(), String> {
        self.gate.validate()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage rooted at `path` and
    /// the in-memory session store.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            gate: GateConfig::default(),
            chunking: ChunkingConfig::default(),
            storage: StorageConfig::Filesystem { path: path.into() },
            session_store: SessionStoreConfig::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert!(config.chunking.enabled);
        assert!(config.storage.is_local());
    }

    #[test]
    fn test_gate_rejects_short_hash() {
        let gate = GateConfig {
            token_hash: Some("abc".to_string()),
        };
        assert!(gate.validate().is_err());

        let gate = GateConfig {
            token_hash: Some("a".repeat(64)),
        };
        gate.validate().unwrap();
    }

    #[test]
    fn test_chunking_rejects_zero_min_chunks() {
        let chunking = ChunkingConfig {
            min_chunks: 0,
            ..Default::default()
        };
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn test_chunking_rejects_ceiling_below_floor() {
        let chunking = ChunkingConfig {
            max_chunk_kb: 1024,
            ..Default::default()
        };
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn test_storage_config_tagged_roundtrip() {
        let json = r#"{"type":"s3","bucket":"uploads","endpoint":null,"region":null,"prefix":null}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        assert!(!config.is_local());

        let json = r#"{"type":"filesystem","path":"/srv/uploads"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_local());
    }

    #[test]
    fn test_session_ttl_saturates() {
        let chunking = ChunkingConfig {
            session_ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(chunking.session_ttl(), Duration::seconds(i64::MAX));
    }
}
