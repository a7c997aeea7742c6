use cloudsync_protocol::VendorError;

/// Errors from the remote API client.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("remote API error: {0}")]
    Api(#[from] VendorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Vendor error number, if this is an API-level failure.
    pub fn errno(&self) -> Option<i32> {
        match self {
            RemoteError::Api(e) => Some(e.errno),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(e) => !e.is_builder(),
            RemoteError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
