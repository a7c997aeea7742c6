use std::fmt;
use std::path::PathBuf;

/// One fixed-size window of a file, held in memory.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based position in the file (the vendor's `partseq`).
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// MD5 hex digest of `data`.
    pub checksum: String,
}

/// A chunk written to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub index: u32,
    pub path: PathBuf,
    pub md5: String,
    pub size: u64,
}

/// Ordered chunk files of one split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkManifest {
    pub chunks: Vec<ChunkFile>,
}

impl ChunkManifest {
    /// Per-chunk digests in content order.
    pub fn block_list(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.md5.clone()).collect()
    }

    pub fn total_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.size).sum()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A precreated upload: the remote's upload id together with the manifest it
/// was issued for.
///
/// The id is only meaningful for this manifest, so the two travel together
/// and are never set independently.
#[derive(Debug, Clone)]
pub struct TransferSession {
    upload_id: String,
    target_path: String,
    manifest: ChunkManifest,
    size: u64,
}

impl TransferSession {
    pub fn new(upload_id: String, target_path: String, manifest: ChunkManifest, size: u64) -> Self {
        Self {
            upload_id,
            target_path,
            manifest,
            size,
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn manifest(&self) -> &ChunkManifest {
        &self.manifest
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn block_list(&self) -> Vec<String> {
        self.manifest.block_list()
    }
}

/// Phases of one chunked upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Split,
    Precreate,
    UploadChunks,
    Create,
    Done,
}

impl UploadPhase {
    /// Returns the phase that follows a successful step.
    pub fn next(self) -> Self {
        match self {
            UploadPhase::Idle => UploadPhase::Split,
            UploadPhase::Split => UploadPhase::Precreate,
            UploadPhase::Precreate => UploadPhase::UploadChunks,
            UploadPhase::UploadChunks => UploadPhase::Create,
            UploadPhase::Create | UploadPhase::Done => UploadPhase::Done,
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadPhase::Idle => "idle",
            UploadPhase::Split => "split",
            UploadPhase::Precreate => "precreate",
            UploadPhase::UploadChunks => "upload_chunks",
            UploadPhase::Create => "create",
            UploadPhase::Done => "done",
        };
        f.write_str(s)
    }
}
