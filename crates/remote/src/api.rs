use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use cloudsync_protocol::{
    CreateResponse, FileMetasResponse, ListAllResponse, PrecreateResponse, SliceUploadResponse,
    SmallUploadResponse,
};
use tokio::io::AsyncRead;

use crate::RemoteError;

/// Boxed future returned by [`RemoteApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Parameters of `file?method=precreate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecreateRequest {
    pub path: String,
    pub size: u64,
    pub block_list: Vec<String>,
}

/// Parameters of `file?method=create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub path: String,
    pub size: u64,
    pub upload_id: String,
    pub block_list: Vec<String>,
}

/// One chunk of a precreated upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    pub path: String,
    pub upload_id: String,
    /// Zero-based chunk index.
    pub partseq: u32,
    /// Chunk file in the scratch directory.
    pub chunk_path: PathBuf,
}

/// An open download body.
pub struct DownloadStream {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    pub body: Pin<Box<dyn AsyncRead + Send>>,
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Abstract access to the remote file API.
///
/// Every call takes the access token explicitly; nothing is cached inside
/// the implementation. Implementations must be safe to call from many
/// tasks at once.
pub trait RemoteApi: Send + Sync {
    /// Fetches one page of a recursive listing starting at `cursor`.
    fn list_all<'a>(
        &'a self,
        token: &'a str,
        path: &'a str,
        cursor: u64,
        limit: u32,
    ) -> ApiFuture<'a, ListAllResponse>;

    /// Announces a chunked upload and obtains its upload id.
    fn precreate<'a>(
        &'a self,
        token: &'a str,
        request: &'a PrecreateRequest,
    ) -> ApiFuture<'a, PrecreateResponse>;

    /// Uploads one chunk file.
    fn upload_chunk<'a>(
        &'a self,
        token: &'a str,
        chunk: &'a ChunkUpload,
    ) -> ApiFuture<'a, SliceUploadResponse>;

    /// Assembles the uploaded chunks into the final file.
    fn create<'a>(
        &'a self,
        token: &'a str,
        request: &'a CreateRequest,
    ) -> ApiFuture<'a, CreateResponse>;

    /// Uploads a whole file in one multipart request, overwriting any
    /// existing file at `remote_path`.
    fn upload_small<'a>(
        &'a self,
        token: &'a str,
        remote_path: &'a str,
        local_path: &'a Path,
    ) -> ApiFuture<'a, SmallUploadResponse>;

    /// Fetches metadata, including download links, for the given ids.
    fn file_metas<'a>(
        &'a self,
        token: &'a str,
        fs_ids: &'a [u64],
    ) -> ApiFuture<'a, FileMetasResponse>;

    /// Opens a download link. Fails unless the server answers 200.
    fn open_download<'a>(&'a self, token: &'a str, dlink: &'a str) -> ApiFuture<'a, DownloadStream>;
}
