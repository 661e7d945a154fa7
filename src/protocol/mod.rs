/*!
 * Store abstraction layer for blobrelay
 *
 * The transfer engine never talks to a storage SDK directly. It consumes two
 * capability traits:
 * - `SourceStore`: metadata lookup and inclusive byte-range reads
 * - `TargetStore`: single-shot puts and the multipart upload lifecycle
 *
 * Implementations:
 * - `memory::MemoryStore`: in-process store used by tests and demos
 * - `gcs::GcsSource`: Google Cloud Storage (feature `gcs-native`)
 * - `s3::S3Target`: Amazon S3 and S3-compatible services (feature `s3-native`)
 */

pub mod error;
pub mod memory;
pub mod uri;

#[cfg(feature = "gcs-native")]
pub mod gcs;

#[cfg(feature = "s3-native")]
pub mod s3;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use uri::parse_locator;

/// A resolved object address: container (bucket) plus object path (key)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    scheme: String,
    container: String,
    path: String,
}

impl ObjectLocation {
    pub fn new(
        scheme: impl Into<String>,
        container: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            container: container.into(),
            path: path.into(),
        }
    }

    /// Locator scheme, e.g. `gs` or `s3`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket / container name
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Object key within the container, without a leading slash
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.container, self.path)
    }
}

/// Source object facts fetched once per transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Object size in bytes
    pub size: u64,
    /// Source-assigned integrity tag
    pub etag: Option<String>,
}

/// Checksum algorithms the engine can attach to write calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChecksumAlgorithm {
    Crc32c,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Crc32c => write!(f, "CRC32C"),
        }
    }
}

/// Checksum attached to a single write call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumParams {
    pub algorithm: ChecksumAlgorithm,
    /// Encoded value (base64 of the big-endian digest)
    pub value: String,
}

impl ChecksumParams {
    pub fn crc32c(value: impl Into<String>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Crc32c,
            value: value.into(),
        }
    }
}

/// Server-side encryption parameters attached to write calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    /// Opaque key reference (KMS key id / ARN)
    pub key_id: String,
}

/// Response to a single-shot put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub etag: String,
    pub checksum_crc32c: Option<String>,
}

/// One acknowledged multipart part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    pub part_number: u32,
    pub etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_crc32c: Option<String>,
}

/// Attributes of the final target object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub etag: Option<String>,
    pub size: Option<u64>,
    pub checksum_crc32c: Option<String>,
}

/// Read capability consumed by the engine
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch size and integrity tag of an object
    ///
    /// Returns `StoreError::NotFound` when the object does not exist.
    async fn fetch_metadata(&self, location: &ObjectLocation) -> StoreResult<SourceMetadata>;

    /// Read the inclusive byte range `[start, end]`
    async fn read_range(&self, location: &ObjectLocation, start: u64, end: u64)
        -> StoreResult<Bytes>;

    /// Short name used in logs
    fn store_name(&self) -> &'static str;
}

/// Write capability consumed by the engine
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Write a whole object in one request
    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<PutResult>;

    /// Start a multipart session and return its id
    async fn begin_multipart(
        &self,
        location: &ObjectLocation,
        checksum_algorithm: Option<ChecksumAlgorithm>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<String>;

    /// Upload one part and return the target-assigned tag
    async fn upload_part(
        &self,
        location: &ObjectLocation,
        session_id: &str,
        part_number: u32,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
    ) -> StoreResult<String>;

    /// Commit a session; `parts` are ordered by part number
    async fn complete_multipart(
        &self,
        location: &ObjectLocation,
        session_id: &str,
        parts: &[PartResult],
    ) -> StoreResult<String>;

    /// Discard a session and any parts already stored for it
    async fn abort_multipart(&self, location: &ObjectLocation, session_id: &str)
        -> StoreResult<()>;

    /// Read back tag, size and checksum of a stored object
    async fn get_object_attributes(&self, location: &ObjectLocation)
        -> StoreResult<ObjectAttributes>;

    /// Short name used in logs
    fn store_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = ObjectLocation::new("gs", "bucket", "dir/file.bin");
        assert_eq!(loc.to_string(), "gs://bucket/dir/file.bin");
        assert_eq!(loc.container(), "bucket");
        assert_eq!(loc.path(), "dir/file.bin");
    }

    #[test]
    fn test_part_result_serialization_skips_missing_checksum() {
        let part = PartResult {
            part_number: 1,
            etag: "\"abc\"".to_string(),
            checksum_crc32c: None,
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(!json.contains("checksum_crc32c"));
    }

    #[test]
    fn test_checksum_algorithm_display() {
        assert_eq!(ChecksumAlgorithm::Crc32c.to_string(), "CRC32C");
        assert_eq!(ChecksumParams::crc32c("AAAAAA==").value, "AAAAAA==");
    }
}
