//! Vendor error numbers.
//!
//! The values are shared between the `xpan` `errno` field and the `pcs`
//! `error_code` field where they overlap.

/// Request succeeded.
pub const SUCCESS: i32 = 0;
/// Expired rights.
pub const EXPIRED_RIGHTS: i32 = -1;
/// File not found (metadata endpoints).
pub const FILE_NOT_FOUND: i32 = -3;
/// Authentication failed.
pub const AUTHENTICATION_FAILED: i32 = -6;
/// Partial listing failure. The page's entries are unusable but pagination
/// may continue.
pub const PARTIAL_LISTING: i32 = -9;
/// Invalid parameter.
pub const INVALID_PARAMETER: i32 = 2;
/// The user does not allow access to their data.
pub const UNAUTHORIZED_USER_ACCESS: i32 = 6;
/// Transfer target already exists.
pub const DUPLICATE_FILE: i32 = 10;
/// Self-sent share.
pub const SELF_SENT_SHARE: i32 = 11;
/// Batch transfer error.
pub const BATCH_TRANSFER_ERROR: i32 = 12;
/// Access token expired.
pub const ACCESS_TOKEN_EXPIRED: i32 = 111;
/// Too many files in one transfer.
pub const EXCESSIVE_TRANSFER_COUNT: i32 = 255;
/// Share does not exist.
pub const SHARE_NOT_FOUND: i32 = 2131;
/// Rate limit hit.
pub const RATE_LIMITED: i32 = 31034;
/// Path does not exist. Listing a missing directory returns this.
pub const PATH_NOT_FOUND: i32 = 31066;
/// Path does not exist, negative form used by some endpoints.
pub const PATH_NOT_FOUND_NEG: i32 = -31066;

/// Returns a human-readable description for a known error number.
pub fn describe(errno: i32) -> &'static str {
    match errno {
        SUCCESS => "success",
        EXPIRED_RIGHTS => "rights expired",
        FILE_NOT_FOUND => "file not found",
        AUTHENTICATION_FAILED => "authentication failed",
        PARTIAL_LISTING => "partial listing failure",
        INVALID_PARAMETER => "invalid parameter",
        UNAUTHORIZED_USER_ACCESS => "user data access not permitted",
        DUPLICATE_FILE => "file already exists",
        SELF_SENT_SHARE => "self-sent share",
        BATCH_TRANSFER_ERROR => "batch transfer error",
        ACCESS_TOKEN_EXPIRED => "access token expired",
        EXCESSIVE_TRANSFER_COUNT => "too many files in transfer",
        SHARE_NOT_FOUND => "share not found",
        RATE_LIMITED => "rate limit exceeded",
        PATH_NOT_FOUND | PATH_NOT_FOUND_NEG => "path not found",
        _ => "unknown error",
    }
}

/// Returns `true` for listing error numbers that mean "the directory is
/// simply not there yet".
pub fn is_missing_path(errno: i32) -> bool {
    matches!(errno, PATH_NOT_FOUND | PATH_NOT_FOUND_NEG)
}
