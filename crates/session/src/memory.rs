//! In-process session store.

use crate::error::SessionResult;
use crate::store::SessionStore;
use async_trait::async_trait;
use sluice_core::hash::FileHash;
use sluice_core::session::{SessionRecord, UploadId};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

struct Entry {
    record: SessionRecord,
    expires_at: OffsetDateTime,
}

/// In-memory session store with per-entry TTL.
///
/// Single-process read-your-writes gives the monotonic visibility the
/// store contract requires, but sessions are not shared across server
/// processes and vanish on restart. Use the SQLite store when multiple
/// workers serve the same upload.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Entry>>,
    by_file_hash: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn live_record(entry: &Entry, now: OffsetDateTime) -> Option<SessionRecord> {
        (entry.expires_at > now).then(|| entry.record.clone())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, record: &SessionRecord, ttl: Duration) -> SessionResult<()> {
        let expires_at = OffsetDateTime::now_utc() + ttl;
        let key = record.upload_id.as_str().to_string();

        if let Some(hash) = &record.file_info.hash {
            self.by_file_hash
                .write()
                .await
                .insert(hash.to_hex(), key.clone());
        }
        self.sessions.write().await.insert(
            key,
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, upload_id: &UploadId) -> SessionResult<Option<SessionRecord>> {
        let now = OffsetDateTime::now_utc();
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(upload_id.as_str()) {
                Some(entry) => match Self::live_record(entry, now) {
                    Some(record) => return Ok(Some(record)),
                    None => true,
                },
                None => false,
            }
        };

        // Lazy eviction of the expired entry and its index.
        if expired {
            self.delete(upload_id).await?;
        }
        Ok(None)
    }

    async fn find_by_file_hash(&self, hash: &FileHash) -> SessionResult<Option<SessionRecord>> {
        let upload_id = {
            let index = self.by_file_hash.read().await;
            index.get(&hash.to_hex()).cloned()
        };
        match upload_id {
            Some(id) => self.get(&UploadId::parse(&id)?).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, upload_id: &UploadId) -> SessionResult<()> {
        let removed = self.sessions.write().await.remove(upload_id.as_str());
        if let Some(entry) = removed
            && let Some(hash) = &entry.record.file_info.hash
        {
            self.by_file_hash.write().await.remove(&hash.to_hex());
        }
        Ok(())
    }

    async fn health_check(&self) -> SessionResult<()> {
        Ok(())
    }
}
