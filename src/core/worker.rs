/*!
 * Part transfer worker: one byte range from source to target
 */

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument};

use super::checksum::crc32c_base64;
use super::planner::ByteRange;
use super::retry::RetryPolicy;
use crate::error::{RelayError, Result};
use crate::protocol::{
    ChecksumParams, EncryptionParams, ObjectLocation, PartResult, PutResult, SourceStore,
    StoreError, TargetStore,
};

/// Moves byte ranges from one source object to one target object
///
/// Reads go through the retry policy; writes are attempted once.
pub struct PartWorker {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    source_location: ObjectLocation,
    target_location: ObjectLocation,
    retry: RetryPolicy,
    checksum: bool,
    encryption: Option<EncryptionParams>,
}

impl PartWorker {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        source_location: ObjectLocation,
        target_location: ObjectLocation,
    ) -> Self {
        Self {
            source,
            target,
            source_location,
            target_location,
            retry: RetryPolicy::default(),
            checksum: false,
            encryption: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach CRC32C checksums to every write
    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    /// Attach server-side encryption to single-shot puts
    pub fn with_encryption(mut self, encryption: Option<EncryptionParams>) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn checksum_enabled(&self) -> bool {
        self.checksum
    }

    pub fn encryption(&self) -> Option<&EncryptionParams> {
        self.encryption.as_ref()
    }

    pub fn target(&self) -> &Arc<dyn TargetStore> {
        &self.target
    }

    pub fn target_location(&self) -> &ObjectLocation {
        &self.target_location
    }

    /// Read one range, retrying any failure (short reads included)
    async fn read(&self, range: ByteRange) -> Result<Bytes> {
        let what = format!("Read of part #{} {}", range.part_number, range);
        self.retry
            .run(&what, || async move {
                let bytes = self
                    .source
                    .read_range(&self.source_location, range.start, range.end)
                    .await?;
                if bytes.len() as u64 != range.len() {
                    return Err(StoreError::ShortRead {
                        expected: range.len(),
                        actual: bytes.len() as u64,
                    });
                }
                Ok(bytes)
            })
            .await
            .map_err(|source| RelayError::SourceRead {
                part: range.part_number,
                source,
            })
    }

    fn checksum_for(&self, range: ByteRange, body: &[u8]) -> Option<ChecksumParams> {
        if !self.checksum {
            return None;
        }
        let value = crc32c_base64(body);
        debug!("Part #{} CRC32C: {}", range.part_number, value);
        Some(ChecksumParams::crc32c(value))
    }

    /// Copy one range as part `range.part_number` of `session_id`
    #[instrument(skip(self), fields(part = range.part_number))]
    pub async fn copy_part(&self, range: ByteRange, session_id: &str) -> Result<PartResult> {
        info!("Reading part #{} {}", range.part_number, range);
        let body = self.read(range).await?;

        let checksum = self.checksum_for(range, &body);

        info!(
            "Uploading part #{} ({} bytes)",
            range.part_number,
            body.len()
        );
        let etag = self
            .target
            .upload_part(
                &self.target_location,
                session_id,
                range.part_number,
                body,
                checksum.as_ref(),
            )
            .await
            .map_err(|source| RelayError::TargetWrite {
                part: range.part_number,
                source,
            })?;

        info!("Part #{} done, etag {}", range.part_number, etag);
        Ok(PartResult {
            part_number: range.part_number,
            etag,
            checksum_crc32c: checksum.map(|c| c.value),
        })
    }

    /// Copy a whole object with one read and one put
    ///
    /// `range` is `None` for an empty object, which is written without reading.
    #[instrument(skip(self))]
    pub async fn copy_whole(&self, range: Option<ByteRange>) -> Result<PutResult> {
        let whole = range.unwrap_or(ByteRange {
            part_number: 1,
            start: 0,
            end: 0,
        });

        let body = match range {
            Some(range) => {
                info!("Reading whole object {} {}", self.source_location, range);
                self.read(range).await?
            }
            None => Bytes::new(),
        };

        let checksum = self.checksum_for(whole, &body);

        info!(
            "Writing {} ({} bytes) in one request",
            self.target_location,
            body.len()
        );
        self.target
            .put_object(
                &self.target_location,
                body,
                checksum.as_ref(),
                self.encryption.as_ref(),
            )
            .await
            .map_err(|source| RelayError::TargetWrite { part: 1, source })
    }
}
