//! S3 implementation of [`TargetStore`]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    ChecksumAlgorithm as S3ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart,
    ObjectAttributes as S3ObjectAttributes, ServerSideEncryption,
};
use aws_sdk_s3::Client as AwsS3Client;
use bytes::Bytes;
use tracing::debug;

use super::client::{build_client, S3Config};
use super::error::from_sdk;
use crate::protocol::{
    ChecksumAlgorithm, ChecksumParams, EncryptionParams, ObjectAttributes, ObjectLocation,
    PartResult, PutResult, StoreError, StoreResult, TargetStore,
};

/// Multipart-capable S3 target
///
/// One client serves every bucket; the bucket comes from each call's location.
#[derive(Clone)]
pub struct S3Target {
    client: AwsS3Client,
}

impl S3Target {
    /// Create a target using the standard AWS credential chain
    pub async fn new(config: &S3Config) -> Self {
        Self {
            client: build_client(config).await,
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: AwsS3Client) -> Self {
        Self { client }
    }
}

fn to_s3_algorithm(algorithm: ChecksumAlgorithm) -> S3ChecksumAlgorithm {
    match algorithm {
        ChecksumAlgorithm::Crc32c => S3ChecksumAlgorithm::Crc32C,
    }
}

fn part_number(part: u32) -> StoreResult<i32> {
    i32::try_from(part)
        .map_err(|_| StoreError::Other(format!("part number {} out of range", part)))
}

#[async_trait]
impl TargetStore for S3Target {
    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<PutResult> {
        let mut request = self
            .client
            .put_object()
            .bucket(location.container())
            .key(location.path())
            .body(ByteStream::from(body));

        if let Some(checksum) = checksum {
            request = request
                .checksum_algorithm(to_s3_algorithm(checksum.algorithm))
                .checksum_crc32c(&checksum.value);
        }
        if let Some(encryption) = encryption {
            request = request
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(&encryption.key_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;
        debug!("PutObject response: {:?}", response);

        let etag = response
            .e_tag()
            .ok_or_else(|| {
                StoreError::MalformedResponse("PutObject returned no ETag".to_string())
            })?
            .to_string();

        Ok(PutResult {
            etag,
            checksum_crc32c: response.checksum_crc32c().map(str::to_string),
        })
    }

    async fn begin_multipart(
        &self,
        location: &ObjectLocation,
        checksum_algorithm: Option<ChecksumAlgorithm>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<String> {
        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(location.container())
            .key(location.path());

        if let Some(algorithm) = checksum_algorithm {
            request = request.checksum_algorithm(to_s3_algorithm(algorithm));
        }
        if let Some(encryption) = encryption {
            request = request
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(&encryption.key_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::MalformedResponse("No upload ID returned".to_string()))
    }

    async fn upload_part(
        &self,
        location: &ObjectLocation,
        session_id: &str,
        part: u32,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
    ) -> StoreResult<String> {
        let mut request = self
            .client
            .upload_part()
            .bucket(location.container())
            .key(location.path())
            .upload_id(session_id)
            .part_number(part_number(part)?)
            .body(ByteStream::from(body));

        if let Some(checksum) = checksum {
            request = request
                .checksum_algorithm(to_s3_algorithm(checksum.algorithm))
                .checksum_crc32c(&checksum.value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;
        debug!("UploadPart #{} response: {:?}", part, response);

        response
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::MalformedResponse(format!("No ETag returned for part {}", part))
            })
    }

    async fn complete_multipart(
        &self,
        location: &ObjectLocation,
        session_id: &str,
        parts: &[PartResult],
    ) -> StoreResult<String> {
        let completed_parts = parts
            .iter()
            .map(|p| {
                Ok(CompletedPart::builder()
                    .part_number(part_number(p.part_number)?)
                    .e_tag(&p.etag)
                    .set_checksum_crc32c(p.checksum_crc32c.clone())
                    .build())
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(location.container())
            .key(location.path())
            .upload_id(session_id)
            .multipart_upload(multipart_upload)
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;
        debug!("CompleteMultipartUpload response: {:?}", response);

        response.e_tag().map(str::to_string).ok_or_else(|| {
            StoreError::MalformedResponse("CompleteMultipartUpload returned no ETag".to_string())
        })
    }

    async fn abort_multipart(
        &self,
        location: &ObjectLocation,
        session_id: &str,
    ) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(location.container())
            .key(location.path())
            .upload_id(session_id)
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;

        Ok(())
    }

    async fn get_object_attributes(
        &self,
        location: &ObjectLocation,
    ) -> StoreResult<ObjectAttributes> {
        let response = self
            .client
            .get_object_attributes()
            .bucket(location.container())
            .key(location.path())
            .object_attributes(S3ObjectAttributes::Etag)
            .object_attributes(S3ObjectAttributes::Checksum)
            .object_attributes(S3ObjectAttributes::ObjectSize)
            .send()
            .await
            .map_err(|e| from_sdk(e, location))?;
        debug!("GetObjectAttributes response: {:?}", response);

        Ok(ObjectAttributes {
            etag: response.e_tag().map(str::to_string),
            size: response.object_size().and_then(|s| u64::try_from(s).ok()),
            checksum_crc32c: response
                .checksum()
                .and_then(|c| c.checksum_crc32c())
                .map(str::to_string),
        })
    }

    fn store_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_algorithm_mapping() {
        assert_eq!(
            to_s3_algorithm(ChecksumAlgorithm::Crc32c),
            S3ChecksumAlgorithm::Crc32C
        );
    }

    #[test]
    fn test_part_number_range() {
        assert_eq!(part_number(1).unwrap(), 1);
        assert_eq!(part_number(10_000).unwrap(), 10_000);
        assert!(part_number(u32::MAX).is_err());
    }
}
