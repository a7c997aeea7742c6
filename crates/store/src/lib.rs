//! Durable status store.
//!
//! The sync engine keeps all cross-run state in a flat key-value store with
//! Redis-like semantics: plain keys with an optional TTL (credentials) and
//! hash namespaces of `field -> value` (pending transfers, fingerprint
//! mappings, fingerprint cache). [`KvStore`] is the seam; [`MemoryStore`]
//! backs tests and [`FjallStore`] persists to disk.
//!
//! All writes are single-key upserts. Nothing here offers multi-key
//! transactions.

mod fjall_store;
mod memory;
mod namespaces;

use std::collections::BTreeMap;
use std::time::Duration;

pub use fjall_store::FjallStore;
pub use memory::MemoryStore;
pub use namespaces::{
    Credentials, FingerprintCache, FingerprintStatus, PendingTransfers, TransferKind,
    TransferReport, TransferState,
};

/// Hash namespace mapping a remote fingerprint to the local fingerprint it
/// was uploaded from.
pub const UPLOAD_PATHS: &str = "upload_paths";

/// Hash namespace of pending uploads keyed by local content fingerprint.
pub const UPLOAD_PENDING: &str = "upload_pending";

/// Hash namespace of pending downloads keyed by decimal remote id.
pub const DOWNLOAD_PATHS: &str = "download_paths";

/// Hash namespace caching local fingerprints keyed by absolute path.
pub const MD5_FILE_MAP: &str = "md5_file_map";

/// Errors produced by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in stored {0}")]
    Utf8(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("missing key: {0}")]
    MissingKey(String),
}

/// Redis-like key-value operations used by the engine.
pub trait KvStore: Send + Sync {
    /// Returns the value of `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Sets `key` to `value`, expiring after `ttl` when given.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns `field` of the hash `namespace`.
    fn hget(&self, namespace: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Upserts `field` of the hash `namespace`.
    fn hset(&self, namespace: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Returns every field of the hash `namespace`.
    fn hgetall(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError>;
}

/// Computes the absolute expiry (unix seconds) for a TTL starting now.
fn expiry_from(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| chrono::Utc::now().timestamp() + ttl.as_secs() as i64)
}

fn is_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_some_and(|at| chrono::Utc::now().timestamp() >= at)
}
