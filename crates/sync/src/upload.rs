//! File upload: single-shot for small files, precreate / chunks / create
//! for the rest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloudsync_protocol::ApiStatus;
use cloudsync_remote::{ChunkUpload, CreateRequest, PrecreateRequest, RemoteApi, RemoteError};
use cloudsync_transfer::{
    ChunkManifest, ProgressCounter, TransferSession, UploadPhase, remove_chunk_file,
    remove_chunk_files, split_file,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::types::{FileProgress, RemoteFingerprint, SyncConfig};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Fingerprint the remote assigned to the new file.
    pub remote_fingerprint: RemoteFingerprint,
    pub remote_path: String,
    pub fs_id: u64,
    /// Number of chunks sent; 0 for the single-shot path.
    pub chunks: usize,
}

/// Uploads local files to the remote.
pub struct Uploader {
    api: Arc<dyn RemoteApi>,
    scratch_dir: PathBuf,
    chunk_size: usize,
    small_file_threshold: u64,
    max_chunk_concurrency: usize,
    inflight: Arc<Semaphore>,
    progress: Option<FileProgress>,
}

impl Uploader {
    pub fn new(api: Arc<dyn RemoteApi>, config: &SyncConfig) -> Self {
        Self {
            api,
            scratch_dir: config.scratch_dir.clone(),
            chunk_size: config.chunk_size,
            small_file_threshold: config.small_file_threshold,
            max_chunk_concurrency: config.max_chunk_concurrency.max(1),
            inflight: Arc::new(Semaphore::new(config.max_inflight_chunks.max(1))),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: FileProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Uploads `local_path` to `remote_path`, overwriting whatever is there.
    pub async fn upload_file(
        &self,
        token: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<UploadOutcome, SyncError> {
        let size = tokio::fs::metadata(local_path).await?.len();
        let counter = self.counter(local_path, size);
        if size <= self.small_file_threshold {
            self.upload_small(token, local_path, remote_path, &counter)
                .await
        } else {
            self.upload_chunked(token, local_path, remote_path, size, &counter)
                .await
        }
    }

    fn counter(&self, local_path: &Path, size: u64) -> ProgressCounter {
        let Some(progress) = self.progress.clone() else {
            return ProgressCounter::silent(size);
        };
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ProgressCounter::new(
            size,
            Some(Arc::new(move |done, total| progress(&name, done, total))),
        )
    }

    async fn upload_small(
        &self,
        token: &str,
        local_path: &Path,
        remote_path: &str,
        counter: &ProgressCounter,
    ) -> Result<UploadOutcome, SyncError> {
        let resp = self.api.upload_small(token, remote_path, local_path).await?;
        resp.check()?;
        if resp.md5.is_empty() {
            return Err(RemoteError::Protocol("upload response has no md5".into()).into());
        }
        counter.add(counter.total());
        debug!(file = %local_path.display(), remote = %remote_path, "single-shot upload complete");
        Ok(UploadOutcome {
            remote_fingerprint: RemoteFingerprint::new(resp.md5),
            remote_path: remote_path.to_string(),
            fs_id: resp.fs_id,
            chunks: 0,
        })
    }

    async fn upload_chunked(
        &self,
        token: &str,
        local_path: &Path,
        remote_path: &str,
        size: u64,
        counter: &ProgressCounter,
    ) -> Result<UploadOutcome, SyncError> {
        let mut phase = UploadPhase::Idle.next();
        let manifest = tokio::task::spawn_blocking({
            let path = local_path.to_path_buf();
            let scratch = self.scratch_dir.clone();
            let chunk_size = self.chunk_size;
            move || split_file(&path, &scratch, chunk_size)
        })
        .await??;
        debug!(file = %local_path.display(), chunks = manifest.len(), %phase, "split complete");

        let result = self
            .run_session(token, remote_path, manifest.clone(), size, counter, &mut phase)
            .await;

        let leftover = remove_chunk_files(&manifest);
        match &result {
            Ok(outcome) => info!(
                file = %local_path.display(),
                remote = %remote_path,
                chunks = outcome.chunks,
                phase = %UploadPhase::Done,
                "chunked upload complete"
            ),
            Err(e) => warn!(
                file = %local_path.display(),
                %phase,
                leftover,
                error = %e,
                "chunked upload failed"
            ),
        }
        result
    }

    async fn run_session(
        &self,
        token: &str,
        remote_path: &str,
        manifest: ChunkManifest,
        size: u64,
        counter: &ProgressCounter,
        phase: &mut UploadPhase,
    ) -> Result<UploadOutcome, SyncError> {
        *phase = phase.next();
        let precreate = PrecreateRequest {
            path: remote_path.to_string(),
            size,
            block_list: manifest.block_list(),
        };
        let resp = self.api.precreate(token, &precreate).await?;
        resp.check()?;
        if resp.uploadid.is_empty() {
            return Err(RemoteError::Protocol("precreate returned no upload id".into()).into());
        }
        let session = TransferSession::new(resp.uploadid, remote_path.to_string(), manifest, size);

        *phase = phase.next();
        self.upload_chunks(token, &session, counter).await?;

        *phase = phase.next();
        let create = CreateRequest {
            path: session.target_path().to_string(),
            size: session.size(),
            upload_id: session.upload_id().to_string(),
            block_list: session.block_list(),
        };
        let resp = self.api.create(token, &create).await?;
        resp.check()?;
        if resp.md5.is_empty() {
            return Err(RemoteError::Protocol("create response has no md5".into()).into());
        }
        *phase = phase.next();

        Ok(UploadOutcome {
            remote_fingerprint: RemoteFingerprint::new(resp.md5),
            remote_path: session.target_path().to_string(),
            fs_id: resp.fs_id,
            chunks: session.manifest().len(),
        })
    }

    /// Sends every chunk of `session`, at most `max_chunk_concurrency` at a
    /// time and never more than the shared in-flight limit. All tasks are
    /// joined; the first failure is returned.
    async fn upload_chunks(
        &self,
        token: &str,
        session: &TransferSession,
        counter: &ProgressCounter,
    ) -> Result<(), SyncError> {
        let token: Arc<str> = Arc::from(token);
        let per_upload = Arc::new(Semaphore::new(self.max_chunk_concurrency));
        let mut tasks = JoinSet::new();

        for chunk in &session.manifest().chunks {
            let upload_permit = Arc::clone(&per_upload)
                .acquire_owned()
                .await
                .map_err(|e| SyncError::Task(e.to_string()))?;
            let inflight_permit = Arc::clone(&self.inflight)
                .acquire_owned()
                .await
                .map_err(|e| SyncError::Task(e.to_string()))?;

            let api = Arc::clone(&self.api);
            let token = Arc::clone(&token);
            let counter = counter.clone();
            let size = chunk.size;
            let request = ChunkUpload {
                path: session.target_path().to_string(),
                upload_id: session.upload_id().to_string(),
                partseq: chunk.index,
                chunk_path: chunk.path.clone(),
            };

            tasks.spawn(async move {
                let result = api.upload_chunk(&token, &request).await;
                if let Err(e) = remove_chunk_file(&request.chunk_path) {
                    warn!(chunk = %request.chunk_path.display(), error = %e, "failed to remove chunk file");
                }
                drop(inflight_permit);
                drop(upload_permit);

                result?.check()?;
                counter.add(size);
                Ok::<u32, SyncError>(request.partseq)
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(partseq)) => debug!(partseq, "chunk uploaded"),
                Ok(Err(e)) => {
                    warn!(error = %e, "chunk upload failed");
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    first_err.get_or_insert(e.into());
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
