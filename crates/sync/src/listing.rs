//! Remote listing.

use cloudsync_protocol::constants::LIST_PAGE_SIZE;
use cloudsync_protocol::{ListEntry, VendorError, errno};
use cloudsync_remote::{RemoteApi, RemoteError};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::types::{RemoteFileRecord, RemoteFingerprint};

/// Lists everything below `path`, recursively, following the cursor until
/// the remote reports no more pages.
///
/// A missing directory yields an empty listing. Pages failing with the
/// partial-listing error are dropped and pagination continues. Any other
/// vendor error aborts.
pub async fn list_remote(
    api: &dyn RemoteApi,
    token: &str,
    path: &str,
) -> Result<Vec<RemoteFileRecord>, SyncError> {
    let mut records = Vec::new();
    let mut cursor = 0u64;
    let mut page = 0usize;

    loop {
        let resp = api.list_all(token, path, cursor, LIST_PAGE_SIZE).await?;
        page += 1;

        match resp.errno {
            errno::SUCCESS => {
                records.extend(resp.list.iter().map(|entry| to_record(path, entry)));
            }
            code if errno::is_missing_path(code) => {
                debug!(path, "remote directory does not exist");
                return Ok(Vec::new());
            }
            errno::PARTIAL_LISTING => {
                warn!(path, page, cursor, dropped = resp.list.len(), "partial listing page skipped");
            }
            code => return Err(VendorError::new(code, resp.errmsg.clone()).into()),
        }

        if !resp.has_more() {
            break;
        }
        if resp.cursor <= cursor {
            return Err(RemoteError::Protocol(format!(
                "listing cursor did not advance past {cursor}"
            ))
            .into());
        }
        cursor = resp.cursor;
    }

    debug!(path, pages = page, entries = records.len(), "remote listing complete");
    Ok(records)
}

fn to_record(root: &str, entry: &ListEntry) -> RemoteFileRecord {
    let root = root.trim_end_matches('/');
    let relative_path = entry
        .path
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(entry.server_filename.as_str())
        .to_string();
    RemoteFileRecord {
        name: entry.server_filename.clone(),
        path: entry.path.clone(),
        relative_path,
        remote_fingerprint: RemoteFingerprint::new(entry.md5.clone()),
        remote_id: entry.fs_id,
        size: entry.size,
        is_directory: entry.is_dir(),
    }
}
