/*!
 * Transfer controller: the top-level copy of one object
 *
 * `Resolving -> MetadataFetch -> Planning -> {SingleShotCopy | MultipartCopy}
 * -> Verifying -> Done`, with `Failed` reachable from every state. A
 * controller is consumed by [`TransferController::run`] and cannot be reused.
 */

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use super::orchestrator::MultipartCopier;
use super::planner::ChunkPlan;
use super::retry::RetryPolicy;
use super::verify::verify_size;
use super::worker::PartWorker;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::protocol::{parse_locator, EncryptionParams, SourceStore, StoreError, TargetStore};
use crate::request::TransferRequest;

/// Final classification of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Target size equals source size
    SizeMatched,
    /// Object was written but its size differs from the source (or is unknown)
    SizeMismatched,
    /// Transfer did not complete
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::SizeMatched => write!(f, "SIZE_MATCHED"),
            TransferStatus::SizeMismatched => write!(f, "SIZE_MISMATCHED"),
            TransferStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result record of one completed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    /// Target container
    pub bucket_name: String,
    /// Target object path
    pub object_name: String,
    /// Size reported by the target
    pub object_size: Option<u64>,
    /// Number of parts written (1 for single-shot)
    pub parts: usize,
    /// Target-assigned tag of the final object
    pub etag: Option<String>,
    /// Whole-object CRC32C reported by the target, when checksums were requested
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub checksum_crc32c: Option<String>,
    /// Wall-clock duration in seconds
    pub execution_time: f64,
}

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Resolving,
    MetadataFetch,
    Planning,
    SingleShotCopy,
    MultipartCopy,
    Verifying,
    Done,
    Failed,
}

/// Runs one [`TransferRequest`] against injected source and target stores
pub struct TransferController {
    request: TransferRequest,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    retry: RetryPolicy,
    abort_on_failure: bool,
    state: TransferState,
}

impl TransferController {
    pub fn new(
        request: TransferRequest,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            request,
            source,
            target,
            retry: RetryPolicy::default(),
            abort_on_failure: true,
            state: TransferState::Resolving,
        }
    }

    /// Apply retry and abort settings from a configuration
    pub fn with_config(self, config: &RelayConfig) -> Self {
        self.with_retry(config.retry_policy())
            .with_abort_on_failure(config.abort_on_failure)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    fn enter(&mut self, next: TransferState) {
        debug!("Transfer state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Copy the object and verify the result
    #[instrument(skip(self), fields(source = %self.request.source(), target = %self.request.target()))]
    pub async fn run(mut self) -> Result<TransferOutcome> {
        let started = Instant::now();

        match self.execute(started).await {
            Ok(outcome) => {
                self.enter(TransferState::Done);
                Ok(outcome)
            }
            Err(e) => {
                error!("Transfer failed in state {:?}: {}", self.state, e);
                self.enter(TransferState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, started: Instant) -> Result<TransferOutcome> {
        let source_location = parse_locator(self.request.source())?;
        let target_location = parse_locator(self.request.target())?;
        info!(
            "{} source container `{}` and object `{}`",
            self.source.store_name(),
            source_location.container(),
            source_location.path()
        );
        info!(
            "{} target container `{}` and object `{}`",
            self.target.store_name(),
            target_location.container(),
            target_location.path()
        );

        self.enter(TransferState::MetadataFetch);
        let metadata = self
            .source
            .fetch_metadata(&source_location)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => RelayError::SourceNotFound {
                    location: source_location.clone(),
                },
                source => RelayError::Session {
                    operation: "Source metadata fetch",
                    source,
                },
            })?;
        info!(
            "Source object size {} bytes, etag {}",
            metadata.size,
            metadata.etag.as_deref().unwrap_or("-")
        );

        self.enter(TransferState::Planning);
        let plan = ChunkPlan::new(metadata.size, self.request.chunk_size())?;

        let encryption = self.request.encryption_key().map(|key| EncryptionParams {
            key_id: key.to_string(),
        });
        let worker = PartWorker::new(
            self.source.clone(),
            self.target.clone(),
            source_location,
            target_location.clone(),
        )
        .with_retry(self.retry)
        .with_checksum(self.request.checksum())
        .with_encryption(encryption);

        let parts = if plan.is_single_shot() {
            self.enter(TransferState::SingleShotCopy);
            info!(
                "Copying in one request: object is below 5 MiB or fits one {}-byte chunk",
                plan.chunk_size()
            );
            worker.copy_whole(plan.ranges().first().copied()).await?;
            1
        } else {
            self.enter(TransferState::MultipartCopy);
            info!(
                "Copying in {} parts with up to {} workers, checksum {}",
                plan.part_count(),
                self.request.max_workers().max(1),
                if self.request.checksum() { "on" } else { "off" }
            );
            MultipartCopier::new(Arc::new(worker), self.request.max_workers())
                .with_abort_on_failure(self.abort_on_failure)
                .run(&plan)
                .await?;
            plan.part_count()
        };

        self.enter(TransferState::Verifying);
        let attributes = self
            .target
            .get_object_attributes(&target_location)
            .await
            .map_err(|source| RelayError::Session {
                operation: "Target attributes fetch",
                source,
            })?;
        debug!("Target attributes: {:?}", attributes);

        let status = verify_size(metadata.size, attributes.size);
        let checksum_crc32c = if self.request.checksum() {
            attributes.checksum_crc32c
        } else {
            None
        };

        let execution_time = started.elapsed().as_secs_f64();
        info!("Object copy total execution time: {:.3} seconds", execution_time);

        Ok(TransferOutcome {
            status,
            bucket_name: target_location.container().to_string(),
            object_name: target_location.path().to_string(),
            object_size: attributes.size,
            parts,
            etag: attributes.etag,
            checksum_crc32c,
            execution_time,
        })
    }
}

/// Copy one object described by `request`, applying `config`'s retry and abort settings
pub async fn transfer(
    request: &TransferRequest,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    config: &RelayConfig,
) -> Result<TransferOutcome> {
    TransferController::new(request.clone(), source, target)
        .with_config(config)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MemoryStore, ObjectLocation};

    fn fast_config() -> RelayConfig {
        RelayConfig {
            retry_delay_secs: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TransferStatus::SizeMatched).unwrap(),
            "\"SIZE_MATCHED\""
        );
        assert_eq!(
            serde_json::to_string(&TransferStatus::SizeMismatched).unwrap(),
            "\"SIZE_MISMATCHED\""
        );
        assert_eq!(TransferStatus::Failed.to_string(), "FAILED");
    }

    #[tokio::test]
    async fn test_single_shot_transfer() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&ObjectLocation::new("mem", "src", "a.txt"), b"hello".to_vec());
        let request = TransferRequest::builder("mem://src/a.txt", "mem://dst/copy/a.txt")
            .checksum(true)
            .build()
            .unwrap();

        let outcome = transfer(&request, store.clone(), store.clone(), &fast_config())
            .await
            .unwrap();

        assert_eq!(outcome.status, TransferStatus::SizeMatched);
        assert_eq!(outcome.bucket_name, "dst");
        assert_eq!(outcome.object_name, "copy/a.txt");
        assert_eq!(outcome.object_size, Some(5));
        assert_eq!(outcome.parts, 1);
        assert!(outcome.checksum_crc32c.is_some());
        assert_eq!(store.journal().begins, 0);
    }

    #[tokio::test]
    async fn test_checksum_omitted_when_not_requested() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&ObjectLocation::new("mem", "src", "a.txt"), b"hello".to_vec());
        let request = TransferRequest::builder("mem://src/a.txt", "mem://dst/a.txt")
            .build()
            .unwrap();

        let outcome = transfer(&request, store.clone(), store, &fast_config())
            .await
            .unwrap();

        assert_eq!(outcome.checksum_crc32c, None);
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("checksum_crc32c").is_none());
        assert_eq!(json["status"], "SIZE_MATCHED");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let store = Arc::new(MemoryStore::new());
        let request = TransferRequest::builder("mem://src/missing", "mem://dst/x")
            .build()
            .unwrap();

        let err = transfer(&request, store.clone(), store, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_locator_fails_before_any_call() {
        let store = Arc::new(MemoryStore::new());
        let request = TransferRequest::builder("not-a-locator", "mem://dst/x")
            .build()
            .unwrap();

        let err = transfer(&request, store.clone(), store.clone(), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidLocator { .. }));
        assert_eq!(store.journal(), Default::default());
    }

    #[tokio::test]
    async fn test_empty_object_single_put() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&ObjectLocation::new("mem", "src", "empty"), Vec::new());
        let request = TransferRequest::builder("mem://src/empty", "mem://dst/empty")
            .build()
            .unwrap();

        let outcome = transfer(&request, store.clone(), store.clone(), &fast_config())
            .await
            .unwrap();

        assert_eq!(outcome.status, TransferStatus::SizeMatched);
        assert_eq!(outcome.parts, 1);
        assert_eq!(outcome.object_size, Some(0));
        assert_eq!(store.journal().puts, 1);
    }

    #[tokio::test]
    async fn test_controller_starts_resolving() {
        let store = Arc::new(MemoryStore::new());
        let request = TransferRequest::builder("mem://a/b", "mem://c/d")
            .build()
            .unwrap();
        let controller = TransferController::new(request, store.clone(), store);
        assert_eq!(controller.state(), TransferState::Resolving);
    }
}
