//! SQLite-backed session store.

use crate::error::SessionResult;
use crate::store::SessionStore;
use async_trait::async_trait;
use sluice_core::hash::FileHash;
use sluice_core::session::{SessionRecord, UploadId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};

/// SQLite session store.
///
/// The record is stored as a JSON value keyed by upload id, with a second
/// table holding the `file_hash -> upload_id` index. Expiry is an epoch
/// second on both rows; expired rows read as absent and are evicted lazily.
/// WAL mode plus a single pooled connection gives every worker process on
/// the host read-your-writes visibility without "database is locked"
/// failures under concurrent ingest.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub async fn new(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // serializes writers and avoids lock errors under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> SessionResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_sessions (
                 upload_id TEXT PRIMARY KEY,
                 record TEXT NOT NULL,
                 expires_at INTEGER NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_file_hashes (
                 file_hash TEXT PRIMARY KEY,
                 upload_id TEXT NOT NULL,
                 expires_at INTEGER NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn put(&self, record: &SessionRecord, ttl: Duration) -> SessionResult<()> {
        let json = serde_json::to_string(record)?;
        let expires_at = (OffsetDateTime::now_utc() + ttl).unix_timestamp();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO upload_sessions (upload_id, record, expires_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(upload_id) DO UPDATE SET record = ?2, expires_at = ?3",
        )
        .bind(record.upload_id.as_str())
        .bind(&json)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        if let Some(hash) = &record.file_info.hash {
            sqlx::query(
                "INSERT INTO upload_file_hashes (file_hash, upload_id, expires_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(file_hash) DO UPDATE SET upload_id = ?2, expires_at = ?3",
            )
            .bind(hash.to_hex())
            .bind(record.upload_id.as_str())
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, upload_id: &UploadId) -> SessionResult<Option<SessionRecord>> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT record, expires_at FROM upload_sessions WHERE upload_id = ?1")
                .bind(upload_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json, expires_at)) if expires_at > now => {
                Ok(Some(serde_json::from_str(&json)?))
            }
            Some(_) => {
                tracing::debug!(upload_id = %upload_id, "evicting expired session");
                self.delete(upload_id).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn find_by_file_hash(&self, hash: &FileHash) -> SessionResult<Option<SessionRecord>> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT upload_id FROM upload_file_hashes WHERE file_hash = ?1 AND expires_at > ?2",
        )
        .bind(hash.to_hex())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((upload_id,)) => self.get(&UploadId::parse(&upload_id)?).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, upload_id: &UploadId) -> SessionResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM upload_file_hashes WHERE upload_id = ?1")
            .bind(upload_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM upload_sessions WHERE upload_id = ?1")
            .bind(upload_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn health_check(&self) -> SessionResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
