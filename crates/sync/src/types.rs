use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use cloudsync_protocol::constants::SMALL_FILE_THRESHOLD;
use cloudsync_transfer::{DEFAULT_CHUNK_SIZE, Fingerprint, FingerprintMode};

/// A regular file found under the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub absolute_path: PathBuf,
    /// Path below the root with `/` separators, including the name.
    pub relative_path: String,
    /// Directory part of `relative_path`; `""` for files in the root.
    pub relative_dir: String,
    pub name: String,
    pub fingerprint: Fingerprint,
    pub size: u64,
}

/// Result of walking the local root.
#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    pub files: Vec<LocalFileRecord>,
    /// Files that could not be read and were left out.
    pub unreadable: usize,
}

impl LocalIndex {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Digest reported by the remote for one of its files.
///
/// It is computed by the vendor and generally differs from the local MD5 of
/// the same content, so it is only ever used as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteFingerprint(String);

impl RemoteFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RemoteFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRecord {
    pub name: String,
    /// Absolute remote path.
    pub path: String,
    /// Path below the remote root, `/`-separated, including the name.
    pub relative_path: String,
    pub remote_fingerprint: RemoteFingerprint,
    pub remote_id: u64,
    pub size: u64,
    pub is_directory: bool,
}

impl RemoteFileRecord {
    /// Directory part of `relative_path`; `""` at the remote root.
    pub fn relative_dir(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

/// What identifies "the same file" on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffKey {
    /// Bare file name. Files with the same name in different directories
    /// collide.
    #[default]
    Name,
    /// Path relative to the sync roots.
    RelativePath,
}

impl DiffKey {
    pub fn local_key<'a>(&self, record: &'a LocalFileRecord) -> &'a str {
        match self {
            DiffKey::Name => &record.name,
            DiffKey::RelativePath => &record.relative_path,
        }
    }

    pub fn remote_key<'a>(&self, record: &'a RemoteFileRecord) -> &'a str {
        match self {
            DiffKey::Name => &record.name,
            DiffKey::RelativePath => &record.relative_path,
        }
    }
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKey::Name => f.write_str("name"),
            DiffKey::RelativePath => f.write_str("relative_path"),
        }
    }
}

impl FromStr for DiffKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(DiffKey::Name),
            "relative_path" => Ok(DiffKey::RelativePath),
            other => Err(format!("unknown diff key {other:?}")),
        }
    }
}

/// Callback receiving `(file name, completed bytes, total bytes)`.
pub type FileProgress = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local directory to reconcile.
    pub local_root: PathBuf,
    /// Remote directory to reconcile, absolute (`/apps/...`).
    pub remote_root: String,
    /// Scratch directory for chunk files.
    pub scratch_dir: PathBuf,
    pub chunk_size: usize,
    /// Files of at most this many bytes use the single-shot upload.
    pub small_file_threshold: u64,
    /// Chunk uploads in flight for one file.
    pub max_chunk_concurrency: usize,
    /// Chunk uploads in flight across the process.
    pub max_inflight_chunks: usize,
    pub diff_key: DiffKey,
    pub fingerprint_mode: FingerprintMode,
    /// Read local fingerprints from the persisted cache when present.
    pub use_fingerprint_cache: bool,
}

impl SyncConfig {
    pub const DEFAULT_CHUNK_CONCURRENCY: usize = 4;
    pub const DEFAULT_INFLIGHT_CHUNKS: usize = 8;

    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: remote_root.into(),
            scratch_dir: scratch_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            small_file_threshold: SMALL_FILE_THRESHOLD,
            max_chunk_concurrency: Self::DEFAULT_CHUNK_CONCURRENCY,
            max_inflight_chunks: Self::DEFAULT_INFLIGHT_CHUNKS,
            diff_key: DiffKey::default(),
            fingerprint_mode: FingerprintMode::default(),
            use_fingerprint_cache: false,
        }
    }
}

/// Counters of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Local files fingerprinted.
    pub scanned: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Remote files (directories excluded) seen in the listing.
    pub remote_entries: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {}, uploaded {}, downloaded {}, skipped {}, failed {}, remote {}",
            self.scanned, self.uploaded, self.downloaded, self.skipped, self.failed, self.remote_entries
        )
    }
}

/// Joins remote path segments with `/`, skipping empty ones.
pub fn join_remote(root: &str, relative_dir: &str, name: &str) -> String {
    let mut path = root.trim_end_matches('/').to_string();
    for segment in [relative_dir.trim_matches('/'), name] {
        if !segment.is_empty() {
            path.push('/');
            path.push_str(segment);
        }
    }
    path
}
