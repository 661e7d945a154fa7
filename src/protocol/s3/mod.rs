//! Amazon S3 target store
//!
//! Implements [`TargetStore`](super::TargetStore) on top of `aws-sdk-s3`,
//! including S3-compatible services such as MinIO or LocalStack.
//!
//! - Credentials come from the standard AWS provider chain (environment,
//!   profile, IMDS, ...)
//! - CRC32C checksums are attached as `x-amz-checksum-crc32c`
//! - Encryption keys are applied as SSE-KMS
//!
//! # Example
//!
//! ```no_run
//! use blobrelay::protocol::s3::{S3Config, S3Target};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = S3Config {
//!         region: Some("eu-west-1".to_string()),
//!         ..Default::default()
//!     };
//!     let target = S3Target::new(&config).await;
//! }
//! ```

pub mod client;
pub mod error;
pub mod target;

pub use client::S3Config;
pub use target::S3Target;
