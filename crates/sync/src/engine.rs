//! Reconciliation: diff the local index against the remote listing, then
//! upload what the remote lacks and download what the local side lacks.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use cloudsync_remote::RemoteApi;
use cloudsync_store::{
    Credentials, FingerprintCache, FingerprintStatus, KvStore, PendingTransfers, StoreError,
    TransferKind, TransferReport,
};
use cloudsync_transfer::{fingerprint_file, validate_relative_path};
use tracing::{debug, info, warn};

use crate::download::Downloader;
use crate::error::SyncError;
use crate::index::{cache_fingerprints, walk_local_cached};
use crate::listing::list_remote;
use crate::types::{
    DiffKey, FileProgress, LocalFileRecord, LocalIndex, RemoteFileRecord, SyncConfig,
    SyncSummary, join_remote,
};
use crate::upload::Uploader;

/// Transfers decided by one diff.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    pub uploads: Vec<LocalFileRecord>,
    pub downloads: Vec<RemoteFileRecord>,
    /// Local files already present remotely with matching content.
    pub skipped: usize,
}

/// Computes what to transfer.
///
/// A local file is uploaded unless a remote file with the same key exists
/// whose remote fingerprint maps, through `status`, to the local file's
/// fingerprint. A remote file is downloaded when no local file has its key.
/// Remote directories never take part.
pub fn plan_transfers(
    local: &[LocalFileRecord],
    remote: &[RemoteFileRecord],
    key: DiffKey,
    status: &FingerprintStatus,
) -> Result<TransferPlan, StoreError> {
    let remote_by_key: BTreeMap<&str, &RemoteFileRecord> = remote
        .iter()
        .filter(|r| !r.is_directory)
        .map(|r| (key.remote_key(r), r))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut plan = TransferPlan::default();

    for record in local {
        let k = key.local_key(record);
        seen.insert(k);

        let known = match remote_by_key.get(k) {
            Some(r) if !r.remote_fingerprint.is_empty() => {
                status.local_for(r.remote_fingerprint.as_str())?
            }
            _ => None,
        };
        if known.as_deref() == Some(record.fingerprint.to_string().as_str()) {
            debug!(file = %record.relative_path, "unchanged");
            plan.skipped += 1;
        } else {
            plan.uploads.push(record.clone());
        }
    }

    plan.downloads = remote_by_key
        .iter()
        .filter(|(k, _)| !seen.contains(*k))
        .map(|(_, r)| (*r).clone())
        .collect();

    Ok(plan)
}

/// Runs reconciliation passes against one remote root.
pub struct Reconciler {
    api: Arc<dyn RemoteApi>,
    config: SyncConfig,
    credentials: Credentials,
    status: FingerprintStatus,
    cache: FingerprintCache,
    uploads: PendingTransfers,
    downloads: PendingTransfers,
    uploader: Uploader,
    downloader: Downloader,
}

impl Reconciler {
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<dyn KvStore>, config: SyncConfig) -> Self {
        Self {
            uploader: Uploader::new(Arc::clone(&api), &config),
            downloader: Downloader::new(Arc::clone(&api)),
            credentials: Credentials::new(Arc::clone(&store)),
            status: FingerprintStatus::new(Arc::clone(&store)),
            cache: FingerprintCache::new(Arc::clone(&store)),
            uploads: PendingTransfers::new(Arc::clone(&store), TransferKind::Upload),
            downloads: PendingTransfers::new(store, TransferKind::Download),
            api,
            config,
        }
    }

    /// Reports byte progress of every transfer to `progress`.
    pub fn with_progress(mut self, progress: FileProgress) -> Self {
        self.uploader = self.uploader.with_progress(Arc::clone(&progress));
        self.downloader = self.downloader.with_progress(progress);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Done/pending counts of the upload and download queues.
    pub fn transfer_report(&self) -> Result<(TransferReport, TransferReport), SyncError> {
        Ok((self.uploads.report()?, self.downloads.report()?))
    }

    /// Fills the fingerprint cache for the local root.
    pub async fn cache_fingerprints(&self) -> Result<usize, SyncError> {
        let root = self.config.local_root.clone();
        let mode = self.config.fingerprint_mode;
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || cache_fingerprints(&root, mode, &cache)).await?
    }

    /// One full pass.
    ///
    /// Fails only when the token is missing, the listing fails or the local
    /// root cannot be walked. Individual transfer failures are logged,
    /// counted and left pending.
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let token = self.access_token()?;
        info!(
            local = %self.config.local_root.display(),
            remote = %self.config.remote_root,
            diff_key = %self.config.diff_key,
            "reconciliation started"
        );

        let remote = list_remote(self.api.as_ref(), &token, &self.config.remote_root).await?;
        let local = self.local_index().await?;
        let plan = plan_transfers(&local.files, &remote, self.config.diff_key, &self.status)?;

        let mut summary = SyncSummary {
            scanned: local.files.len(),
            skipped: plan.skipped,
            remote_entries: remote.iter().filter(|r| !r.is_directory).count(),
            ..SyncSummary::default()
        };
        info!(
            uploads = plan.uploads.len(),
            downloads = plan.downloads.len(),
            skipped = plan.skipped,
            "transfer plan ready"
        );

        let uploads: Vec<_> = plan
            .uploads
            .iter()
            .filter(|r| enqueue(&self.uploads, &r.fingerprint.to_string(), &mut summary))
            .collect();
        let downloads: Vec<_> = plan
            .downloads
            .iter()
            .filter(|r| enqueue(&self.downloads, &r.remote_id.to_string(), &mut summary))
            .collect();

        for record in uploads {
            match self.upload_one(&token, record).await {
                Ok(()) => summary.uploaded += 1,
                Err(e) => {
                    warn!(file = %record.relative_path, error = %e, "upload failed");
                    summary.failed += 1;
                }
            }
        }

        for record in downloads {
            match self.download_one(&token, record).await {
                Ok(()) => summary.downloaded += 1,
                Err(e) => {
                    warn!(file = %record.relative_path, remote_id = record.remote_id, error = %e, "download failed");
                    summary.failed += 1;
                }
            }
        }

        info!(%summary, "reconciliation finished");
        Ok(summary)
    }

    fn access_token(&self) -> Result<String, SyncError> {
        match self.credentials.access_token() {
            Ok(token) => Ok(token),
            Err(StoreError::MissingKey(_)) => Err(SyncError::MissingToken),
            Err(e) => Err(e.into()),
        }
    }

    async fn local_index(&self) -> Result<LocalIndex, SyncError> {
        let root = self.config.local_root.clone();
        let mode = self.config.fingerprint_mode;
        let cache = self.config.use_fingerprint_cache.then(|| self.cache.clone());
        tokio::task::spawn_blocking(move || walk_local_cached(&root, mode, cache.as_ref())).await?
    }

    async fn upload_one(&self, token: &str, record: &LocalFileRecord) -> Result<(), SyncError> {
        let local_fp = record.fingerprint.to_string();
        let target = join_remote(&self.config.remote_root, &record.relative_dir, &record.name);
        info!(file = %record.relative_path, remote = %target, fingerprint = %local_fp, "uploading");

        let outcome = self
            .uploader
            .upload_file(token, &record.absolute_path, &target)
            .await?;
        self.status.record(outcome.remote_fingerprint.as_str(), &local_fp)?;
        self.uploads.mark_done(&local_fp)?;
        Ok(())
    }

    async fn download_one(&self, token: &str, record: &RemoteFileRecord) -> Result<(), SyncError> {
        let target_dir = self.download_dir(record)?;
        info!(file = %record.relative_path, remote_id = record.remote_id, "downloading");

        let path = self
            .downloader
            .download(token, record.remote_id, &target_dir)
            .await?;

        let mode = self.config.fingerprint_mode;
        let hashed = path.clone();
        let local_fp = tokio::task::spawn_blocking(move || fingerprint_file(&hashed, mode)).await??;
        let local_fp = local_fp.to_string();

        if !record.remote_fingerprint.is_empty() {
            self.status.record(record.remote_fingerprint.as_str(), &local_fp)?;
        }
        if self.config.use_fingerprint_cache {
            self.cache.put(&path, &local_fp)?;
        }
        self.downloads.mark_done(&record.remote_id.to_string())?;
        Ok(())
    }

    /// Local directory mirroring the remote file's directory.
    fn download_dir(&self, record: &RemoteFileRecord) -> Result<PathBuf, SyncError> {
        let dir = record.relative_dir();
        if dir.is_empty() {
            return Ok(self.config.local_root.clone());
        }
        validate_relative_path(dir)?;
        Ok(self.config.local_root.join(dir))
    }
}

/// Writes a pending entry. A store failure drops the file from this pass.
fn enqueue(queue: &PendingTransfers, key: &str, summary: &mut SyncSummary) -> bool {
    match queue.mark_pending(key) {
        Ok(()) => true,
        Err(e) => {
            warn!(kind = ?queue.kind(), key, error = %e, "failed to enqueue transfer");
            summary.failed += 1;
            false
        }
    }
}
