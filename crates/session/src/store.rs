//! Session store trait definition.

use crate::error::SessionResult;
use async_trait::async_trait;
use sluice_core::hash::FileHash;
use sluice_core::session::{SessionRecord, UploadId};
use time::Duration;

/// Key-value store for upload session records.
///
/// Keeps the primary mapping `upload_id -> SessionRecord` plus a secondary
/// index `file_hash -> upload_id` for resumability. Both entries share the
/// TTL passed to `put`.
///
/// Implementations must provide monotonic visibility: once a `put` returns,
/// any subsequent `get` observes that value or a later one. No
/// compare-and-swap is offered; callers doing read-modify-write cycles must
/// re-read and verify their update landed (see the ingest endpoint).
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Write a session record, replacing any previous value and refreshing
    /// the TTL. Updates the file-hash index if the record carries a hash.
    async fn put(&self, record: &SessionRecord, ttl: Duration) -> SessionResult<()>;

    /// Fetch a session record. Expired records read as absent.
    async fn get(&self, upload_id: &UploadId) -> SessionResult<Option<SessionRecord>>;

    /// Look up a session by the whole-file fingerprint. Two lookups:
    /// hash -> upload_id, then upload_id -> record.
    async fn find_by_file_hash(&self, hash: &FileHash) -> SessionResult<Option<SessionRecord>>;

    /// Remove the record and its file-hash index entry.
    async fn delete(&self, upload_id: &UploadId) -> SessionResult<()>;

    /// Check store availability.
    async fn health_check(&self) -> SessionResult<()>;
}
