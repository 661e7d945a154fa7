//! Error type shared by all store adapters

use std::io;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`super::SourceStore`] or [`super::TargetStore`]
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Object not found in container
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Network / transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Service error with a provider error code
    #[error("Service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Access denied error
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Store returned fewer or more bytes than requested
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    /// Response was missing a required field
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Check if the target refused the payload because its checksum did not match
    pub fn is_checksum_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::Service { code, .. }
                if code == "BadDigest" || code == "XAmzContentChecksumMismatch"
        )
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}
