//! Local side of chunked transfers.
//!
//! Content fingerprints, fixed-size chunking into a scratch directory, the
//! ordered chunk manifest the remote expects, and the session tying an
//! upload id to the manifest that produced it.

mod chunked;
mod fingerprint;
mod progress;
mod types;
mod validation;

pub use chunked::{
    ChunkReader, calculate_file_checksum, checksum_bytes, checksum_leading_window, join_chunks,
    remove_chunk_file, remove_chunk_files, split_file,
};
pub use fingerprint::{Fingerprint, FingerprintMode, fingerprint_file};
pub use progress::{ProgressCallback, ProgressCounter};
pub use types::{Chunk, ChunkFile, ChunkManifest, TransferSession, UploadPhase};
pub use validation::{validate_file_name, validate_relative_path};

/// Default chunk size: the vendor's 4 MiB block size.
pub const DEFAULT_CHUNK_SIZE: usize = cloudsync_protocol::constants::BLOCK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch in chunk {index}")]
    ChecksumMismatch { index: u32 },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}
