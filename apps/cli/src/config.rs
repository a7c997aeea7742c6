//! CLI configuration.
//!
//! Stored as TOML, by default at:
//! - Linux: `~/.config/cloudsync/config.toml`
//! - Windows: `%APPDATA%/cloudsync/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use cloudsync_protocol::constants::{
    API_REQUEST_TIMEOUT, BLOCK_SIZE, PCS_BASE_URL, RETRY_ATTEMPTS, SMALL_FILE_THRESHOLD,
    UPLOAD_REQUEST_TIMEOUT, XPAN_BASE_URL,
};
use cloudsync_remote::ClientConfig;
use cloudsync_sync::{DiffKey, SyncConfig};
use cloudsync_transfer::FingerprintMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Local directory to keep in sync. `~` is expanded.
    #[serde(default = "default_local_dir")]
    pub sync_dir: String,

    /// Scratch directory for upload chunks.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote directory to keep in sync.
    #[serde(default = "default_remote_dir")]
    pub sync_dir: String,

    #[serde(default = "default_xpan_url")]
    pub xpan_base_url: String,

    #[serde(default = "default_pcs_url")]
    pub pcs_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the state database.
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_small_file_threshold")]
    pub small_file_threshold: u64,

    #[serde(default = "default_chunk_concurrency")]
    pub max_chunk_concurrency: usize,

    #[serde(default = "default_inflight_chunks")]
    pub max_inflight_chunks: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// `name` or `relative_path`.
    #[serde(default = "default_diff_key")]
    pub diff_key: String,

    /// `full`, `head` or `head:<bytes>`.
    #[serde(default = "default_fingerprint_mode")]
    pub fingerprint_mode: String,

    #[serde(default)]
    pub use_fingerprint_cache: bool,
}

fn default_local_dir() -> String {
    "~/cloudsync".into()
}

fn default_tmp_dir() -> String {
    std::env::temp_dir()
        .join("cloudsync")
        .to_string_lossy()
        .into_owned()
}

fn default_remote_dir() -> String {
    "/apps/cloudsync".into()
}

fn default_xpan_url() -> String {
    XPAN_BASE_URL.into()
}

fn default_pcs_url() -> String {
    PCS_BASE_URL.into()
}

fn default_store_path() -> String {
    "~/.local/share/cloudsync/state".into()
}

fn default_chunk_size() -> usize {
    BLOCK_SIZE
}

fn default_small_file_threshold() -> u64 {
    SMALL_FILE_THRESHOLD
}

fn default_chunk_concurrency() -> usize {
    SyncConfig::DEFAULT_CHUNK_CONCURRENCY
}

fn default_inflight_chunks() -> usize {
    SyncConfig::DEFAULT_INFLIGHT_CHUNKS
}

fn default_request_timeout() -> u64 {
    API_REQUEST_TIMEOUT.as_secs()
}

fn default_upload_timeout() -> u64 {
    UPLOAD_REQUEST_TIMEOUT.as_secs()
}

fn default_retry_attempts() -> u32 {
    RETRY_ATTEMPTS
}

fn default_diff_key() -> String {
    DiffKey::default().to_string()
}

fn default_fingerprint_mode() -> String {
    FingerprintMode::default().to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sync_dir: default_local_dir(),
            tmp_dir: default_tmp_dir(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            sync_dir: default_remote_dir(),
            xpan_base_url: default_xpan_url(),
            pcs_base_url: default_pcs_url(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            small_file_threshold: default_small_file_threshold(),
            max_chunk_concurrency: default_chunk_concurrency(),
            max_inflight_chunks: default_inflight_chunks(),
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            diff_key: default_diff_key(),
            fingerprint_mode: default_fingerprint_mode(),
            use_fingerprint_cache: false,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), writing
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        expand_home(&self.store.path)
    }

    /// Engine settings.
    pub fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let diff_key: DiffKey = self
            .sync
            .diff_key
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let fingerprint_mode: FingerprintMode = self.sync.fingerprint_mode.parse()?;
        if self.transfer.chunk_size == 0 {
            anyhow::bail!("transfer.chunk_size must be positive");
        }

        let mut config = SyncConfig::new(
            expand_home(&self.general.sync_dir),
            self.remote.sync_dir.clone(),
            expand_home(&self.general.tmp_dir),
        );
        config.chunk_size = self.transfer.chunk_size;
        config.small_file_threshold = self.transfer.small_file_threshold;
        config.max_chunk_concurrency = self.transfer.max_chunk_concurrency;
        config.max_inflight_chunks = self.transfer.max_inflight_chunks;
        config.diff_key = diff_key;
        config.fingerprint_mode = fingerprint_mode;
        config.use_fingerprint_cache = self.sync.use_fingerprint_cache;
        Ok(config)
    }

    /// HTTP client settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            xpan_base_url: self.remote.xpan_base_url.clone(),
            pcs_base_url: self.remote.pcs_base_url.clone(),
            request_timeout: Duration::from_secs(self.transfer.request_timeout_secs),
            upload_timeout: Duration::from_secs(self.transfer.upload_timeout_secs),
            retry_attempts: self.transfer.retry_attempts,
        }
    }
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    PathBuf::from(std::env::var(var).unwrap_or_else(|_| "/tmp".into()))
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => home_dir(),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => {
            home_dir().join(&rest[1..])
        }
        _ => PathBuf::from(path),
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("cloudsync").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Ok(home_dir()
            .join(".config")
            .join("cloudsync")
            .join("config.toml"))
    }
}
