//! Reconciliation engine.
//!
//! A pass lists the remote root, fingerprints the local root, diffs the two
//! and then drains the resulting uploads and downloads. Every planned
//! transfer is written to the store as pending before any of them starts,
//! so an interrupted pass leaves a record of what was outstanding.

mod download;
mod engine;
mod error;
mod index;
mod listing;
mod types;
mod upload;

pub use download::Downloader;
pub use engine::{Reconciler, TransferPlan, plan_transfers};
pub use error::SyncError;
pub use index::{cache_fingerprints, walk_local, walk_local_cached};
pub use listing::list_remote;
pub use types::{
    DiffKey, FileProgress, LocalFileRecord, LocalIndex, RemoteFileRecord, RemoteFingerprint,
    SyncConfig, SyncSummary, join_remote,
};
pub use upload::{UploadOutcome, Uploader};
