//! Typed views over the raw key-value store.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use cloudsync_protocol::constants::{
    ACCESS_TOKEN_KEY, ACCESS_TOKEN_TTL, REFRESH_TOKEN_KEY, REFRESH_TOKEN_TTL,
};

use crate::{DOWNLOAD_PATHS, KvStore, MD5_FILE_MAP, StoreError, UPLOAD_PATHS, UPLOAD_PENDING};

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// OAuth tokens persisted between runs.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn KvStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Returns the stored access token.
    pub fn access_token(&self) -> Result<String, StoreError> {
        self.store
            .get(ACCESS_TOKEN_KEY)?
            .ok_or_else(|| StoreError::MissingKey(ACCESS_TOKEN_KEY.to_string()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// Stores a fresh token pair with their vendor lifetimes.
    pub fn store_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.store
            .set(ACCESS_TOKEN_KEY, access, Some(ACCESS_TOKEN_TTL))?;
        self.store
            .set(REFRESH_TOKEN_KEY, refresh, Some(REFRESH_TOKEN_TTL))?;
        tracing::info!("stored new credentials");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pending transfers
// ---------------------------------------------------------------------------

/// Which pending-transfer namespace to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Keyed by local content fingerprint.
    Upload,
    /// Keyed by decimal remote id.
    Download,
}

impl TransferKind {
    pub fn namespace(self) -> &'static str {
        match self {
            TransferKind::Upload => UPLOAD_PENDING,
            TransferKind::Download => DOWNLOAD_PATHS,
        }
    }
}

/// Persisted state of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Done,
}

impl TransferState {
    /// Stored representation: `"false"` while pending, `"true"` once done.
    pub fn as_str(self) -> &'static str {
        match self {
            TransferState::Pending => "false",
            TransferState::Done => "true",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "false" => Some(TransferState::Pending),
            "true" => Some(TransferState::Done),
            _ => None,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Pending => f.write_str("pending"),
            TransferState::Done => f.write_str("done"),
        }
    }
}

/// Keys of one pending-transfer namespace split by state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub done: Vec<String>,
    pub pending: Vec<String>,
}

/// Pending/done markers for one transfer direction.
#[derive(Clone)]
pub struct PendingTransfers {
    store: Arc<dyn KvStore>,
    kind: TransferKind,
}

impl PendingTransfers {
    pub fn new(store: Arc<dyn KvStore>, kind: TransferKind) -> Self {
        Self { store, kind }
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn mark_pending(&self, key: &str) -> Result<(), StoreError> {
        self.set(key, TransferState::Pending)
    }

    pub fn mark_done(&self, key: &str) -> Result<(), StoreError> {
        self.set(key, TransferState::Done)
    }

    /// Returns the recorded state. Unrecognized values read as absent.
    pub fn state(&self, key: &str) -> Result<Option<TransferState>, StoreError> {
        Ok(self
            .store
            .hget(self.kind.namespace(), key)?
            .as_deref()
            .and_then(TransferState::parse))
    }

    /// Lists every key in the namespace grouped by state.
    pub fn report(&self) -> Result<TransferReport, StoreError> {
        let mut report = TransferReport::default();
        for (key, raw) in self.store.hgetall(self.kind.namespace())? {
            match TransferState::parse(&raw) {
                Some(TransferState::Done) => report.done.push(key),
                Some(TransferState::Pending) => report.pending.push(key),
                None => {
                    tracing::warn!(namespace = self.kind.namespace(), %key, value = %raw, "ignoring unrecognized transfer state")
                }
            }
        }
        Ok(report)
    }

    fn set(&self, key: &str, state: TransferState) -> Result<(), StoreError> {
        tracing::debug!(namespace = self.kind.namespace(), %key, %state, "transfer state");
        self.store.hset(self.kind.namespace(), key, state.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint mappings
// ---------------------------------------------------------------------------

/// Maps a remote fingerprint to the local fingerprint of the same content.
///
/// The vendor reports its own digest for uploaded files, which rarely equals
/// the local one. Recording the pair lets the next diff recognize the file.
#[derive(Clone)]
pub struct FingerprintStatus {
    store: Arc<dyn KvStore>,
}

impl FingerprintStatus {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, remote_fp: &str, local_fp: &str) -> Result<(), StoreError> {
        self.store.hset(UPLOAD_PATHS, remote_fp, local_fp)
    }

    pub fn local_for(&self, remote_fp: &str) -> Result<Option<String>, StoreError> {
        self.store.hget(UPLOAD_PATHS, remote_fp)
    }
}

/// Local fingerprints cached by absolute path.
#[derive(Clone)]
pub struct FingerprintCache {
    store: Arc<dyn KvStore>,
}

impl FingerprintCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, path: &Path) -> Result<Option<String>, StoreError> {
        self.store.hget(MD5_FILE_MAP, &path.to_string_lossy())
    }

    pub fn put(&self, path: &Path, fingerprint: &str) -> Result<(), StoreError> {
        self.store
            .hset(MD5_FILE_MAP, &path.to_string_lossy(), fingerprint)
    }
}
