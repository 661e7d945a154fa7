/*!
 * Multi-object batch payloads
 *
 * A payload lists the objects to copy plus optional defaults:
 *
 * ```json
 * {
 *   "objects": [
 *     { "source_uri": "gs://src/a.bin", "target_uri": "s3://dst/a.bin", "checksum": "yes", "max_workers": 1 },
 *     { "source_uri": "gs://src/b.bin", "target_uri": "s3://dst/b.bin", "chunk_size": 104857600 }
 *   ],
 *   "defaults": { "checksum": "false", "chunk_size": 67108864, "max_workers": 2 }
 * }
 * ```
 *
 * Objects are copied one after another. A failing object is reported in the
 * response and does not stop the batch.
 */

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::core::transfer::{TransferController, TransferOutcome, TransferStatus};
use crate::error::{RelayError, Result};
use crate::protocol::{SourceStore, TargetStore};
use crate::request::{Flag, TransferRequest};

/// Error code reported for a failed object
pub const FAILED_ERR_CODE: u16 = 500;

/// One object to copy
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchObject {
    pub source_uri: String,
    pub target_uri: String,
    #[serde(default)]
    pub checksum: Option<Flag>,
    #[serde(default)]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

/// Settings applied to objects that do not set their own
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchDefaults {
    #[serde(default)]
    pub checksum: Option<Flag>,
    #[serde(default)]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

/// A validated batch payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchPayload {
    pub objects: Vec<BatchObject>,
    #[serde(default)]
    pub defaults: BatchDefaults,
}

impl BatchPayload {
    /// Parse and validate a JSON payload
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: BatchPayload = serde_json::from_str(json)
            .map_err(|e| RelayError::Config(format!("Invalid batch payload: {}", e)))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Load a payload from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.objects.is_empty() {
            return Err(RelayError::Config(
                "Invalid batch payload: `objects` must contain at least one item".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve one object against payload defaults and `config`
    pub fn request_for(
        &self,
        object: &BatchObject,
        config: &RelayConfig,
    ) -> Result<TransferRequest> {
        let chunk_size = object
            .chunk_size
            .or(self.defaults.chunk_size)
            .unwrap_or(config.chunk_size);
        let max_workers = object
            .max_workers
            .or(self.defaults.max_workers)
            .unwrap_or(config.max_workers);
        let checksum = object
            .checksum
            .or(self.defaults.checksum)
            .map(Flag::get)
            .unwrap_or(config.checksum);

        TransferRequest::builder(object.source_uri.as_str(), object.target_uri.as_str())
            .chunk_size(chunk_size)
            .max_workers(max_workers)
            .checksum(checksum)
            .expand_templates()?
            .build()
    }
}

/// Per-object entry of a [`BatchResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchResult {
    Copied(TransferOutcome),
    Failed {
        status: TransferStatus,
        err_code: u16,
        err_message: String,
    },
}

impl BatchResult {
    fn failed(err: &RelayError) -> Self {
        BatchResult::Failed {
            status: TransferStatus::Failed,
            err_code: FAILED_ERR_CODE,
            err_message: err.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchResult::Failed { .. })
    }
}

/// Results of a batch, in payload order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchResult>,
}

impl BatchResponse {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// True when any object failed or landed with a mismatched size
    pub fn has_problems(&self) -> bool {
        self.results.iter().any(|r| match r {
            BatchResult::Failed { .. } => true,
            BatchResult::Copied(outcome) => outcome.status != TransferStatus::SizeMatched,
        })
    }
}

/// Copy every object of `payload`, sequentially
pub async fn run_batch(
    payload: &BatchPayload,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    config: &RelayConfig,
) -> BatchResponse {
    let mut results = Vec::with_capacity(payload.objects.len());

    for (index, object) in payload.objects.iter().enumerate() {
        let number = index + 1;
        info!(
            "Copying object #{}: {} -> {}",
            number, object.source_uri, object.target_uri
        );

        let outcome = match payload.request_for(object, config) {
            Ok(request) => {
                TransferController::new(request, source.clone(), target.clone())
                    .with_config(config)
                    .run()
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(outcome) => {
                info!("Object #{} completed with status {}", number, outcome.status);
                results.push(BatchResult::Copied(outcome));
            }
            Err(e) => {
                error!("Error copying object #{}: {}", number, e);
                results.push(BatchResult::failed(&e));
            }
        }
    }

    BatchResponse { results }
}
