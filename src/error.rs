/*!
 * Error types for blobrelay
 */

use std::fmt;
use std::io;

use thiserror::Error;

use crate::protocol::{ObjectLocation, StoreError};

pub type Result<T> = std::result::Result<T, RelayError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

/// Errors raised by the transfer engine
///
/// A size mismatch after an otherwise successful copy is not an error; it is
/// reported through [`crate::core::TransferStatus::SizeMismatched`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// Locator could not be split into container and object path
    #[error("Invalid locator `{locator}`: {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// Source object does not exist
    #[error("Source object not found: {location}")]
    SourceNotFound { location: ObjectLocation },

    /// Reading a byte range from the source failed after all attempts
    #[error("Source read failed for part #{part}: {source}")]
    SourceRead {
        part: u32,
        #[source]
        source: StoreError,
    },

    /// Writing a part (or the whole object) to the target failed
    #[error("Target write failed for part #{part}: {source}")]
    TargetWrite {
        part: u32,
        #[source]
        source: StoreError,
    },

    /// A non-part call against a store failed (session begin/complete, metadata, attributes)
    #[error("{operation} failed: {source}")]
    Session {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Invalid object size / chunk size combination
    #[error("Planning error: {0}")]
    Planning(String),

    /// Configuration, payload or command-line error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A part worker task panicked or was cancelled
    #[error("Part worker crashed: {0}")]
    Worker(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::InvalidLocator { .. }
            | RelayError::SourceNotFound { .. }
            | RelayError::Planning(_)
            | RelayError::Config(_) => EXIT_FATAL,
            RelayError::TargetWrite { source, .. } if source.is_checksum_rejection() => {
                EXIT_INTEGRITY
            }
            _ => EXIT_FATAL,
        }
    }

    /// Part number the error is attributed to, if any
    pub fn part(&self) -> Option<u32> {
        match self {
            RelayError::SourceRead { part, .. } | RelayError::TargetWrite { part, .. } => {
                Some(*part)
            }
            _ => None,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::InvalidLocator { .. } => ErrorCategory::Validation,
            RelayError::SourceNotFound { .. } => ErrorCategory::Validation,
            RelayError::SourceRead { .. } => ErrorCategory::SourceIo,
            RelayError::TargetWrite { .. } => ErrorCategory::TargetIo,
            RelayError::Session { .. } => ErrorCategory::Network,
            RelayError::Planning(_) => ErrorCategory::Planning,
            RelayError::Config(_) => ErrorCategory::Configuration,
            RelayError::Worker(_) => ErrorCategory::Internal,
            RelayError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Locator / existence validation errors
    Validation,
    /// Source read errors
    SourceIo,
    /// Target write errors
    TargetIo,
    /// Store calls outside a single part
    Network,
    /// Chunk planning errors
    Planning,
    /// Configuration errors
    Configuration,
    /// Local I/O operation errors
    IoError,
    /// Task failures inside the engine
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::SourceIo => write!(f, "source_io"),
            ErrorCategory::TargetIo => write!(f, "target_io"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Planning => write!(f, "planning"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Config(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(format!("TOML parse error: {}", err))
    }
}
