//! Wire protocol types for the xpan netdisk open API.
//!
//! Every response the sync engine consumes is modelled here as a plain
//! serde struct. Two error conventions coexist on the wire: the `xpan`
//! endpoints report `errno`/`errmsg`, the `pcs` upload endpoints report
//! `error_code`/`error_msg`. Both are normalised through [`ApiStatus`].

pub mod constants;
pub mod envelope;
pub mod errno;
pub mod messages;

// Re-export primary types for convenience.
pub use envelope::{ApiStatus, VendorError};
pub use messages::{
    CreateResponse, FileMeta, FileMetasResponse, ListAllResponse, ListEntry, PrecreateResponse,
    SliceUploadResponse, SmallUploadResponse,
};
