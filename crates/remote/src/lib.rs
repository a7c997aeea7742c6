//! Client for the xpan netdisk open API.
//!
//! [`RemoteApi`] is the seam the sync engine talks to; [`XpanClient`] is the
//! reqwest implementation. Responses are returned as decoded wire structs
//! with their vendor status untouched, so callers decide which error
//! numbers are benign.

mod api;
mod client;
mod error;

pub use api::{ApiFuture, ChunkUpload, CreateRequest, DownloadStream, PrecreateRequest, RemoteApi};
pub use client::{ClientConfig, XpanClient};
pub use error::RemoteError;
