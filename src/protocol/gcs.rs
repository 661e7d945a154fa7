//! Google Cloud Storage source store
//!
//! Implements [`SourceStore`] with the `object_store` crate. Authentication
//! follows the standard GCS environment (`GOOGLE_APPLICATION_CREDENTIALS`,
//! `GOOGLE_SERVICE_ACCOUNT`, ...). One client is built per bucket on first use
//! and reused afterwards.
//!
//! # Example
//!
//! ```no_run
//! use blobrelay::protocol::gcs::GcsSource;
//! use blobrelay::protocol::{parse_locator, SourceStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = GcsSource::new();
//!     let location = parse_locator("gs://my-bucket/path/to/file.bin")?;
//!     let meta = source.fetch_metadata(&location).await?;
//!     println!("Size: {} bytes", meta.size);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::{path::Path as ObjectPath, ObjectStore};

use super::{ObjectLocation, SourceMetadata, SourceStore, StoreError, StoreResult};

/// Ranged-read GCS source
#[derive(Default)]
pub struct GcsSource {
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl GcsSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn store_for(&self, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = Arc::new(
            GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| StoreError::Other(format!("Failed to create GCS client: {}", e)))?,
        );
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

fn map_error(error: object_store::Error, location: &ObjectLocation) -> StoreError {
    match error {
        object_store::Error::NotFound { .. } => StoreError::NotFound {
            container: location.container().to_string(),
            key: location.path().to_string(),
        },
        other => {
            let message = other.to_string();
            if message.contains("403") || message.contains("Forbidden") {
                StoreError::AccessDenied(message)
            } else {
                StoreError::Network(message)
            }
        }
    }
}

#[async_trait]
impl SourceStore for GcsSource {
    #[tracing::instrument(skip(self, location), fields(store = "gcs", location = %location))]
    async fn fetch_metadata(&self, location: &ObjectLocation) -> StoreResult<SourceMetadata> {
        let store = self.store_for(location.container())?;
        let meta = store
            .head(&ObjectPath::from(location.path()))
            .await
            .map_err(|e| map_error(e, location))?;

        Ok(SourceMetadata {
            size: meta.size as u64,
            etag: meta.e_tag,
        })
    }

    async fn read_range(
        &self,
        location: &ObjectLocation,
        start: u64,
        end: u64,
    ) -> StoreResult<Bytes> {
        let store = self.store_for(location.container())?;
        store
            .get_range(
                &ObjectPath::from(location.path()),
                start as usize..end as usize + 1,
            )
            .await
            .map_err(|e| map_error(e, location))
    }

    fn store_name(&self) -> &'static str {
        "gcs"
    }
}
