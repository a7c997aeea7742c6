use std::time::Duration;

/// Base URL of the metadata (`xpan`) endpoints.
pub const XPAN_BASE_URL: &str = "https://pan.baidu.com";

/// Base URL of the upload (`pcs`) endpoints.
pub const PCS_BASE_URL: &str = "https://d.pcs.baidu.com";

/// User agent the download host insists on for `dlink` requests.
pub const DOWNLOAD_USER_AGENT: &str = "pan.baidu.com";

/// Maximum entries returned per `listall` page.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// Block size the remote expects for chunked uploads (4 MiB).
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Files at or below this size are sent with the single-shot upload call.
pub const SMALL_FILE_THRESHOLD: u64 = 4 * 1024 * 1024;

/// `rtype` sent to precreate/create: overwrite an existing file.
pub const RTYPE_OVERWRITE: i32 = 3;

/// `autoinit` flag sent to precreate.
pub const AUTOINIT: i32 = 1;

/// Timeout for metadata requests (list, precreate, create, filemetas).
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for requests that carry file bodies (chunk and small uploads).
pub const UPLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Attempts made for every outbound request before the last error is surfaced.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Credential store key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "AccessCode";

/// Credential store key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "RefreshCode";

/// Lifetime of a freshly issued access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Lifetime of a freshly issued refresh token.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(60 * 24 * 60 * 60);
