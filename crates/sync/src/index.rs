//! Local fingerprint index.
//!
//! Walks the sync root and fingerprints every regular file. Per-file read
//! errors are logged and the file is left out; only a root that cannot be
//! walked at all is an error.

use std::io;
use std::path::Path;

use cloudsync_store::FingerprintCache;
use cloudsync_transfer::{Fingerprint, FingerprintMode, fingerprint_file};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::types::{LocalFileRecord, LocalIndex};

/// Walks `root` and fingerprints every regular file.
pub fn walk_local(root: &Path, mode: FingerprintMode) -> Result<LocalIndex, SyncError> {
    walk_local_cached(root, mode, None)
}

/// Like [`walk_local`], but reuses fingerprints from `cache` when one of the
/// same mode is stored for the file's absolute path. Fresh fingerprints are
/// written back.
///
/// The cache is trusted as-is; modification times are not compared.
pub fn walk_local_cached(
    root: &Path,
    mode: FingerprintMode,
    cache: Option<&FingerprintCache>,
) -> Result<LocalIndex, SyncError> {
    let mut index = LocalIndex::default();
    for_each_file(root, |path, relative_dir, name| {
        let fingerprint = match cached(cache, path, mode) {
            Some(fp) => fp,
            None => {
                let fp = fingerprint_file(path, mode)?;
                if let Some(cache) = cache {
                    cache.put(path, &fp.to_string())?;
                }
                fp
            }
        };
        let size = std::fs::metadata(path)?.len();
        let relative_path = if relative_dir.is_empty() {
            name.clone()
        } else {
            format!("{relative_dir}/{name}")
        };
        index.files.push(LocalFileRecord {
            absolute_path: path.to_path_buf(),
            relative_path,
            relative_dir,
            name,
            fingerprint,
            size,
        });
        Ok(())
    }, &mut index.unreadable)?;

    debug!(
        root = %root.display(),
        files = index.files.len(),
        unreadable = index.unreadable,
        "local walk complete"
    );
    Ok(index)
}

/// Precomputes fingerprints for every file under `root` into `cache`.
/// Returns the number of files cached.
pub fn cache_fingerprints(
    root: &Path,
    mode: FingerprintMode,
    cache: &FingerprintCache,
) -> Result<usize, SyncError> {
    info!(root = %root.display(), %mode, "caching local fingerprints");
    let mut cached = 0;
    let mut unreadable = 0;
    for_each_file(root, |path, _, _| {
        let fp = fingerprint_file(path, mode)?;
        cache.put(path, &fp.to_string())?;
        debug!(file = %path.display(), fingerprint = %fp, "cached");
        cached += 1;
        Ok(())
    }, &mut unreadable)?;
    info!(cached, unreadable, "fingerprint cache updated");
    Ok(cached)
}

fn cached(cache: Option<&FingerprintCache>, path: &Path, mode: FingerprintMode) -> Option<Fingerprint> {
    let raw = match cache?.get(path) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "fingerprint cache read failed");
            return None;
        }
    };
    raw.parse::<Fingerprint>()
        .ok()
        .filter(|fp| fp.mode() == mode)
}

/// Calls `visit(path, relative_dir, name)` for every regular file under
/// `root`. Errors from `visit` and unreadable entries below the root are
/// logged and counted in `unreadable`.
fn for_each_file(
    root: &Path,
    mut visit: impl FnMut(&Path, String, String) -> Result<(), SyncError>,
    unreadable: &mut usize,
) -> Result<(), SyncError> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        )
        .into());
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                *unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative_dir = path
            .strip_prefix(root)
            .ok()
            .and_then(Path::parent)
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let name = entry.file_name().to_string_lossy().into_owned();

        if let Err(e) = visit(path, relative_dir, name) {
            warn!(file = %path.display(), error = %e, "skipping file");
            *unreadable += 1;
        }
    }
    Ok(())
}
