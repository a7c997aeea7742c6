use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::TransferError;
use crate::chunked::{calculate_file_checksum, checksum_leading_window};

/// How a local fingerprint is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FingerprintMode {
    /// MD5 of the whole file.
    #[default]
    Full,
    /// MD5 of the first `n` bytes only.
    LeadingWindow(u64),
}

impl FingerprintMode {
    /// Default window for [`FingerprintMode::LeadingWindow`].
    pub const DEFAULT_WINDOW: u64 = 4096;

    fn tag(self) -> String {
        match self {
            FingerprintMode::Full => "md5".to_string(),
            FingerprintMode::LeadingWindow(n) => format!("md5-head{n}"),
        }
    }
}

impl fmt::Display for FingerprintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintMode::Full => f.write_str("full"),
            FingerprintMode::LeadingWindow(n) => write!(f, "head:{n}"),
        }
    }
}

/// Parses `full`, `head` (default window) or `head:<bytes>`.
impl FromStr for FingerprintMode {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(FingerprintMode::Full),
            "head" => Ok(FingerprintMode::LeadingWindow(Self::DEFAULT_WINDOW)),
            other => other
                .strip_prefix("head:")
                .and_then(|n| n.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(FingerprintMode::LeadingWindow)
                .ok_or_else(|| TransferError::InvalidFingerprint(format!("unknown mode {other:?}"))),
        }
    }
}

/// A local content fingerprint tagged with the mode that produced it.
///
/// Renders as `md5:<hex>` or `md5-head<n>:<hex>`, so fingerprints of
/// different modes never compare equal, in memory or once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    mode: FingerprintMode,
    digest: String,
}

impl Fingerprint {
    pub fn new(mode: FingerprintMode, digest: impl Into<String>) -> Self {
        Self {
            mode,
            digest: digest.into(),
        }
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    /// Hex digest without the mode tag.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode.tag(), self.digest)
    }
}

impl FromStr for Fingerprint {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransferError::InvalidFingerprint(s.to_string());
        let (tag, digest) = s.split_once(':').ok_or_else(invalid)?;
        if digest.is_empty() {
            return Err(invalid());
        }
        let mode = match tag {
            "md5" => FingerprintMode::Full,
            _ => tag
                .strip_prefix("md5-head")
                .and_then(|n| n.parse().ok())
                .map(FingerprintMode::LeadingWindow)
                .ok_or_else(invalid)?,
        };
        Ok(Self::new(mode, digest))
    }
}

/// Fingerprints the file at `path` using `mode`.
pub fn fingerprint_file(path: &Path, mode: FingerprintMode) -> Result<Fingerprint, TransferError> {
    let digest = match mode {
        FingerprintMode::Full => calculate_file_checksum(path)?,
        FingerprintMode::LeadingWindow(n) => checksum_leading_window(path, n)?,
    };
    Ok(Fingerprint::new(mode, digest))
}
