//! File download by remote id.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use cloudsync_protocol::ApiStatus;
use cloudsync_remote::{RemoteApi, RemoteError};
use cloudsync_transfer::{ProgressCounter, validate_file_name};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::types::FileProgress;

const COPY_BUFFER: usize = 64 * 1024;

/// Downloads remote files into local directories.
pub struct Downloader {
    api: Arc<dyn RemoteApi>,
    progress: Option<FileProgress>,
}

impl Downloader {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: FileProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Downloads the file `remote_id` into `target_dir`, keeping its remote
    /// name. Returns the local path written.
    ///
    /// No retry happens here; a failed download leaves no partial file.
    pub async fn download(
        &self,
        token: &str,
        remote_id: u64,
        target_dir: &Path,
    ) -> Result<PathBuf, SyncError> {
        let metas = self.api.file_metas(token, &[remote_id]).await?;
        metas.check()?;
        let meta = metas
            .list
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Protocol(format!("no metadata for remote id {remote_id}")))?;
        if meta.dlink.is_empty() {
            return Err(RemoteError::Protocol(format!("no download link for remote id {remote_id}")).into());
        }
        validate_file_name(&meta.filename)?;

        tokio::fs::create_dir_all(target_dir).await?;
        let target = target_dir.join(&meta.filename);

        let stream = self.api.open_download(token, &meta.dlink).await?;
        // With neither a length header nor a metadata size the body is read
        // to EOF.
        let expected = stream
            .content_length
            .or((meta.size > 0).then_some(meta.size));
        let counter = self.counter(&meta.filename, expected.unwrap_or(0));
        debug!(remote_id, file = %target.display(), bytes = ?expected, "downloading");

        match write_body(stream.body, &target, expected, &counter).await {
            Ok(written) => {
                info!(remote_id, file = %target.display(), bytes = written, "download complete");
                Ok(target)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&target).await;
                Err(e)
            }
        }
    }

    fn counter(&self, name: &str, total: u64) -> ProgressCounter {
        let Some(progress) = self.progress.clone() else {
            return ProgressCounter::silent(total);
        };
        let name = name.to_string();
        ProgressCounter::new(
            total,
            Some(Arc::new(move |done, total| progress(&name, done, total))),
        )
    }
}

/// Copies `body` into `target`, stopping after `expected` bytes when the
/// length is known.
async fn write_body(
    body: Pin<Box<dyn AsyncRead + Send>>,
    target: &Path,
    expected: Option<u64>,
    counter: &ProgressCounter,
) -> Result<u64, SyncError> {
    let mut reader = body.take(expected.unwrap_or(u64::MAX));
    let mut file = tokio::fs::File::create(target).await?;
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut written = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        written += n as u64;
        counter.add(n as u64);
    }
    file.flush().await?;

    if let Some(total) = expected.filter(|total| written < *total) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("download ended after {written} of {total} bytes"),
        )
        .into());
    }
    Ok(written)
}
