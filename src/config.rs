/*!
 * Configuration types for blobrelay
 */

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::retry::RetryPolicy;
use crate::error::{RelayError, Result};

/// Main configuration for transfer operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Part size in bytes for multipart copies
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Maximum in-flight part workers (0 or 1 = sequential)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Attach CRC32C checksums to every write
    #[serde(default)]
    pub checksum: bool,

    /// Total read attempts per byte range (first try included)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between read attempts, in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Abort the multipart session when a part fails
    #[serde(default = "default_true")]
    pub abort_on_failure: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// S3 region override
    #[serde(default)]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack, ...)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Use path-style addressing for S3
    #[serde(default)]
    pub s3_force_path_style: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
            checksum: false,
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            abort_on_failure: true,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
            s3_region: None,
            s3_endpoint: None,
            s3_force_path_style: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> u64 {
    64 * 1024 * 1024 // 64 MiB
}

fn default_max_workers() -> usize {
    2
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RelayError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Read retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.retry_attempts,
            Duration::from_secs(self.retry_delay_secs),
        )
    }
}
