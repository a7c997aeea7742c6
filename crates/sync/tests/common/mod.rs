#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloudsync_protocol::{
    CreateResponse, FileMetasResponse, ListAllResponse, PrecreateResponse, SliceUploadResponse,
    SmallUploadResponse,
};
use cloudsync_remote::{
    ApiFuture, ChunkUpload, CreateRequest, DownloadStream, PrecreateRequest, RemoteApi, RemoteError,
};
use cloudsync_store::{Credentials, MemoryStore};
use cloudsync_sync::{Reconciler, SyncConfig};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const ROOT: &str = "/apps/backup";

/// Digest the fake remote reports; deliberately different from the local one.
pub fn vendor_md5(data: &[u8]) -> String {
    format!("v{:x}", md5::compute(data))
}

pub fn local_fp(data: &[u8]) -> String {
    format!("md5:{:x}", md5::compute(data))
}

/// Listing entry in wire form.
pub fn entry(path: &str, fs_id: u64, md5: &str, size: usize, isdir: bool) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({
        "fs_id": fs_id,
        "path": path,
        "server_filename": name,
        "size": size,
        "isdir": if isdir { 1 } else { 0 },
        "md5": md5,
    })
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub fs_id: u64,
    pub data: Vec<u8>,
    pub md5: String,
}

struct Session {
    path: String,
    size: u64,
    block_list: Vec<String>,
    parts: BTreeMap<u32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    next_id: u64,
    sessions: HashMap<String, Session>,
    pages: VecDeque<Value>,
    list_errno: Option<i32>,
    fail_partseq: Option<u32>,
    truncate_downloads: bool,
    hide_sizes: bool,
    calls: Vec<&'static str>,
}

impl State {
    fn insert(&mut self, path: &str, data: Vec<u8>) -> u64 {
        self.next_id += 1;
        let fs_id = 1000 + self.next_id;
        let md5 = vendor_md5(&data);
        self.files.insert(path.to_string(), StoredFile { fs_id, data, md5 });
        fs_id
    }
}

type MetasHook = Box<dyn Fn(u64) + Send + Sync>;

/// In-memory netdisk.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<State>,
    active_chunks: AtomicUsize,
    peak_chunks: AtomicUsize,
    metas_hook: Mutex<Option<MetasHook>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_file(&self, path: &str, data: &[u8]) -> u64 {
        self.state.lock().unwrap().insert(path, data.to_vec())
    }

    /// Stores a file under a fixed id.
    pub fn put_file_with_id(&self, path: &str, fs_id: u64, data: &[u8]) {
        let md5 = vendor_md5(data);
        self.state.lock().unwrap().files.insert(
            path.to_string(),
            StoredFile { fs_id, data: data.to_vec(), md5 },
        );
    }

    pub fn file(&self, path: &str) -> Option<StoredFile> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    /// Listing pages returned, in order, before the real listing is used.
    pub fn script_pages(&self, pages: Vec<Value>) {
        self.state.lock().unwrap().pages.extend(pages);
    }

    pub fn fail_listing(&self, errno: i32) {
        self.state.lock().unwrap().list_errno = Some(errno);
    }

    pub fn fail_chunk(&self, partseq: u32) {
        self.state.lock().unwrap().fail_partseq = Some(partseq);
    }

    /// Advertises more bytes than the download body carries.
    pub fn truncate_downloads(&self) {
        self.state.lock().unwrap().truncate_downloads = true;
    }

    /// Omits the size from file metadata and the length from downloads.
    pub fn hide_download_sizes(&self) {
        self.state.lock().unwrap().hide_sizes = true;
    }

    pub fn on_file_metas(&self, hook: impl Fn(u64) + Send + Sync + 'static) {
        *self.metas_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    pub fn peak_chunks(&self) -> usize {
        self.peak_chunks.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    Ok(serde_json::from_value(value)?)
}

impl RemoteApi for MockRemote {
    fn list_all<'a>(
        &'a self,
        _token: &'a str,
        path: &'a str,
        cursor: u64,
        limit: u32,
    ) -> ApiFuture<'a, ListAllResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_all");
        let value = if let Some(page) = state.pages.pop_front() {
            page
        } else if let Some(errno) = state.list_errno {
            json!({ "errno": errno, "list": [] })
        } else {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let matching: Vec<_> = state
                .files
                .iter()
                .filter(|(p, _)| p.starts_with(&prefix))
                .collect();
            let page: Vec<Value> = matching
                .iter()
                .skip(cursor as usize)
                .take(limit as usize)
                .map(|(p, f)| entry(p, f.fs_id, &f.md5, f.data.len(), false))
                .collect();
            let next = cursor + page.len() as u64;
            let has_more = next < matching.len() as u64;
            json!({
                "errno": 0,
                "cursor": next,
                "has_more": if has_more { 1 } else { 0 },
                "list": page,
            })
        };
        drop(state);
        Box::pin(async move { parse(value) })
    }

    fn precreate<'a>(
        &'a self,
        _token: &'a str,
        request: &'a PrecreateRequest,
    ) -> ApiFuture<'a, PrecreateResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("precreate");
        let upload_id = format!("up-{}", state.sessions.len() + 1);
        state.sessions.insert(
            upload_id.clone(),
            Session {
                path: request.path.clone(),
                size: request.size,
                block_list: request.block_list.clone(),
                parts: BTreeMap::new(),
            },
        );
        let blocks: Vec<usize> = (0..request.block_list.len()).collect();
        drop(state);
        Box::pin(async move {
            parse(json!({
                "errno": 0,
                "path": request.path,
                "uploadid": upload_id,
                "return_type": 1,
                "block_list": blocks,
            }))
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        _token: &'a str,
        chunk: &'a ChunkUpload,
    ) -> ApiFuture<'a, SliceUploadResponse> {
        Box::pin(async move {
            let active = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_chunks.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            let data = tokio::fs::read(&chunk.chunk_path).await;
            self.active_chunks.fetch_sub(1, Ordering::SeqCst);
            let data = data?;

            let mut state = self.state.lock().unwrap();
            state.calls.push("upload_chunk");
            if state.fail_partseq == Some(chunk.partseq) {
                return Err(RemoteError::Status {
                    status: 500,
                    body: "slice rejected".into(),
                });
            }
            let md5 = format!("{:x}", md5::compute(&data));
            let session = state
                .sessions
                .get_mut(&chunk.upload_id)
                .ok_or_else(|| RemoteError::Protocol(format!("unknown upload {}", chunk.upload_id)))?;
            session.parts.insert(chunk.partseq, data);
            parse(json!({ "md5": md5 }))
        })
    }

    fn create<'a>(
        &'a self,
        _token: &'a str,
        request: &'a CreateRequest,
    ) -> ApiFuture<'a, CreateResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create");
        let value = match state.sessions.remove(&request.upload_id) {
            None => json!({ "errno": 31363, "errmsg": "unknown upload" }),
            Some(session) => {
                let complete = session.parts.len() == session.block_list.len()
                    && session.block_list == request.block_list
                    && session
                        .parts
                        .iter()
                        .all(|(i, part)| {
                            session.block_list.get(*i as usize)
                                == Some(&format!("{:x}", md5::compute(part)))
                        });
                let data: Vec<u8> = session.parts.into_values().flatten().collect();
                if !complete || data.len() as u64 != session.size || session.path != request.path {
                    json!({ "errno": 31363, "errmsg": "block miss in superfile2" })
                } else {
                    let fs_id = state.insert(&request.path, data);
                    let file = &state.files[&request.path];
                    json!({
                        "errno": 0,
                        "fs_id": fs_id,
                        "md5": file.md5,
                        "path": request.path,
                        "size": request.size,
                    })
                }
            }
        };
        drop(state);
        Box::pin(async move { parse(value) })
    }

    fn upload_small<'a>(
        &'a self,
        _token: &'a str,
        remote_path: &'a str,
        local_path: &'a Path,
    ) -> ApiFuture<'a, SmallUploadResponse> {
        Box::pin(async move {
            let data = tokio::fs::read(local_path).await?;
            let size = data.len();
            let mut state = self.state.lock().unwrap();
            state.calls.push("upload_small");
            let fs_id = state.insert(remote_path, data);
            let md5 = state.files[remote_path].md5.clone();
            parse(json!({
                "fs_id": fs_id,
                "md5": md5,
                "path": remote_path,
                "size": size,
            }))
        })
    }

    fn file_metas<'a>(
        &'a self,
        _token: &'a str,
        fs_ids: &'a [u64],
    ) -> ApiFuture<'a, FileMetasResponse> {
        if let Some(hook) = self.metas_hook.lock().unwrap().as_ref() {
            for id in fs_ids {
                hook(*id);
            }
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push("file_metas");
        let hide_sizes = state.hide_sizes;
        let list: Vec<Value> = state
            .files
            .iter()
            .filter(|(_, f)| fs_ids.contains(&f.fs_id))
            .map(|(path, f)| {
                let mut meta = json!({
                    "fs_id": f.fs_id,
                    "filename": path.rsplit('/').next().unwrap_or(path),
                    "path": path,
                    "size": f.data.len(),
                    "isdir": 0,
                    "md5": f.md5,
                    "dlink": format!("https://d.pcs.example/file/{}", f.fs_id),
                });
                if hide_sizes {
                    meta.as_object_mut().unwrap().remove("size");
                }
                meta
            })
            .collect();
        drop(state);
        Box::pin(async move { parse(json!({ "errno": 0, "list": list })) })
    }

    fn open_download<'a>(&'a self, _token: &'a str, dlink: &'a str) -> ApiFuture<'a, DownloadStream> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("open_download");
        let found = dlink
            .rsplit('/')
            .next()
            .and_then(|id| id.parse::<u64>().ok())
            .and_then(|id| state.files.values().find(|f| f.fs_id == id))
            .map(|f| f.data.clone());
        let truncate = state.truncate_downloads;
        let hide_sizes = state.hide_sizes;
        drop(state);
        Box::pin(async move {
            let data = found.ok_or(RemoteError::Status {
                status: 404,
                body: String::new(),
            })?;
            let advertised = data.len() as u64 + if truncate { 7 } else { 0 };
            Ok(DownloadStream {
                content_length: (!hide_sizes).then_some(advertised),
                body: Box::pin(Cursor::new(data)),
            })
        })
    }
}

/// A local root, scratch dir, store with credentials and a fake remote.
pub struct Harness {
    pub remote: Arc<MockRemote>,
    pub store: Arc<MemoryStore>,
    pub local: TempDir,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Credentials::new(store.clone())
            .store_tokens("access-token", "refresh-token")
            .unwrap();
        Self {
            remote: MockRemote::new(),
            store,
            local: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        }
    }

    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.local.path(), ROOT, self.scratch.path())
    }

    pub fn reconciler(&self, config: SyncConfig) -> Reconciler {
        Reconciler::new(self.remote.clone(), self.store.clone(), config)
    }

    pub fn write_local(&self, relative: &str, data: &[u8]) {
        let path = self.local.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}
