use cloudsync_protocol::VendorError;
use cloudsync_remote::RemoteError;
use cloudsync_store::StoreError;
use cloudsync_transfer::TransferError;

/// Errors produced by the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no access token stored")]
    MissingToken,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("task failed: {0}")]
    Task(String),
}

impl From<VendorError> for SyncError {
    fn from(e: VendorError) -> Self {
        SyncError::Remote(RemoteError::Api(e))
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}

impl SyncError {
    /// Vendor error number when the failure came from the remote API.
    pub fn errno(&self) -> Option<i32> {
        match self {
            SyncError::Remote(e) => e.errno(),
            _ => None,
        }
    }
}
