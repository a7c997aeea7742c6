use crate::errno;

/// Error details carried by a vendor response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("errno {errno}: {message}")]
pub struct VendorError {
    pub errno: i32,
    pub message: String,
}

impl VendorError {
    /// Builds an error, falling back to the catalogue description when the
    /// server sent no message.
    pub fn new(errno: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() || message == "succ" {
            errno::describe(errno).to_string()
        } else {
            message
        };
        Self { errno, message }
    }
}

/// Uniform access to the status part of a vendor response.
pub trait ApiStatus {
    /// The vendor error number (0 on success).
    fn errno(&self) -> i32;

    /// The vendor error message, possibly empty.
    fn errmsg(&self) -> &str;

    /// Converts a non-zero error number into a [`VendorError`].
    fn check(&self) -> Result<(), VendorError> {
        match self.errno() {
            errno::SUCCESS => Ok(()),
            code => Err(VendorError::new(code, self.errmsg())),
        }
    }
}
