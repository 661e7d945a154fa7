//! In-memory store implementing both capability traits
//!
//! Objects, multipart sessions and every call made against the store live in
//! process memory, so transfers can be exercised end-to-end without network
//! access. Failures can be injected per read offset and per part number.
//!
//! # Example
//!
//! ```rust
//! use blobrelay::protocol::{MemoryStore, ObjectLocation};
//!
//! let store = MemoryStore::new();
//! let loc = ObjectLocation::new("mem", "bucket", "hello.txt");
//! store.insert(&loc, b"Hello, World!".to_vec());
//! assert_eq!(store.object(&loc).unwrap().len(), 13);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use super::{
    ChecksumAlgorithm, ChecksumParams, EncryptionParams, ObjectAttributes, ObjectLocation,
    PartResult, PutResult, SourceMetadata, SourceStore, StoreError, StoreResult, TargetStore,
};
use crate::core::checksum::crc32c_base64;

type Key = (String, String);

fn key_of(location: &ObjectLocation) -> Key {
    (location.container().to_string(), location.path().to_string())
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    checksum_crc32c: Option<String>,
    encryption_key: Option<String>,
}

#[derive(Debug)]
struct Session {
    key: Key,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    encryption_key: Option<String>,
    parts: BTreeMap<u32, (Bytes, String)>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<Key, StoredObject>,
    sessions: HashMap<String, Session>,
    next_session: u64,

    read_failures: HashMap<u64, u32>,
    upload_failures: HashSet<u32>,
    fail_puts: bool,
    fail_begin: bool,
    fail_metadata: bool,
    fail_attributes: bool,
    reported_size: Option<u64>,
    upload_delay: Option<Duration>,

    reads: Vec<(u64, u64)>,
    uploaded_parts: Vec<u32>,
    puts: usize,
    begins: usize,
    completes: usize,
    aborts: usize,
    in_flight_uploads: usize,
    max_in_flight_uploads: usize,
}

/// Call counts recorded by a [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallJournal {
    /// Every range read attempt, including failed ones
    pub reads: Vec<(u64, u64)>,
    /// Part numbers of successful uploads, in completion order
    pub uploaded_parts: Vec<u32>,
    pub puts: usize,
    pub begins: usize,
    pub completes: usize,
    pub aborts: usize,
    /// Highest number of `upload_part` calls observed at the same time
    pub max_in_flight_uploads: usize,
    /// Sessions neither completed nor aborted
    pub open_sessions: usize,
}

/// In-memory object store usable as both source and target
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an object
    pub fn insert(&self, location: &ObjectLocation, data: impl Into<Bytes>) {
        let data = data.into();
        let object = StoredObject {
            etag: object_etag(&data),
            data,
            checksum_crc32c: None,
            encryption_key: None,
        };
        self.state().objects.insert(key_of(location), object);
    }

    /// Get object contents
    pub fn object(&self, location: &ObjectLocation) -> Option<Bytes> {
        self.state()
            .objects
            .get(&key_of(location))
            .map(|o| o.data.clone())
    }

    /// Encryption key the object was written with, if any
    pub fn encryption_key(&self, location: &ObjectLocation) -> Option<String> {
        self.state()
            .objects
            .get(&key_of(location))
            .and_then(|o| o.encryption_key.clone())
    }

    /// Fail the next `times` reads whose range starts at `start`
    pub fn fail_reads_at(&self, start: u64, times: u32) {
        self.state().read_failures.insert(start, times);
    }

    /// Fail every upload of the given part number
    pub fn fail_upload_of_part(&self, part_number: u32) {
        self.state().upload_failures.insert(part_number);
    }

    /// Fail every single-shot put
    pub fn fail_puts(&self) {
        self.state().fail_puts = true;
    }

    /// Fail every multipart begin
    pub fn fail_begin(&self) {
        self.state().fail_begin = true;
    }

    /// Fail every metadata lookup with a service error
    pub fn fail_metadata(&self) {
        self.state().fail_metadata = true;
    }

    /// Fail every `get_object_attributes` call with a service error
    pub fn fail_attributes(&self) {
        self.state().fail_attributes = true;
    }

    /// Report this size from `get_object_attributes` instead of the real one
    pub fn report_size(&self, size: u64) {
        self.state().reported_size = Some(size);
    }

    /// Sleep inside every `upload_part` call
    pub fn set_upload_delay(&self, delay: Duration) {
        self.state().upload_delay = Some(delay);
    }

    /// Snapshot of the calls made so far
    pub fn journal(&self) -> CallJournal {
        let state = self.state();
        CallJournal {
            reads: state.reads.clone(),
            uploaded_parts: state.uploaded_parts.clone(),
            puts: state.puts,
            begins: state.begins,
            completes: state.completes,
            aborts: state.aborts,
            max_in_flight_uploads: state.max_in_flight_uploads,
            open_sessions: state.sessions.len(),
        }
    }
}

fn object_etag(data: &[u8]) -> String {
    format!("\"{:08x}\"", crc32c::crc32c(data))
}

fn verify_checksum(body: &[u8], checksum: Option<&ChecksumParams>) -> StoreResult<Option<String>> {
    match checksum {
        Some(params) => {
            let actual = match params.algorithm {
                ChecksumAlgorithm::Crc32c => crc32c_base64(body),
            };
            if actual != params.value {
                return Err(StoreError::Service {
                    code: "BadDigest".to_string(),
                    message: format!(
                        "{} checksum mismatch: declared {}, computed {}",
                        params.algorithm, params.value, actual
                    ),
                });
            }
            Ok(Some(actual))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn fetch_metadata(&self, location: &ObjectLocation) -> StoreResult<SourceMetadata> {
        let state = self.state();
        if state.fail_metadata {
            return Err(StoreError::Service {
                code: "InternalError".to_string(),
                message: "injected metadata failure".to_string(),
            });
        }
        let object = state
            .objects
            .get(&key_of(location))
            .ok_or_else(|| StoreError::NotFound {
                container: location.container().to_string(),
                key: location.path().to_string(),
            })?;

        Ok(SourceMetadata {
            size: object.data.len() as u64,
            etag: Some(object.etag.clone()),
        })
    }

    async fn read_range(
        &self,
        location: &ObjectLocation,
        start: u64,
        end: u64,
    ) -> StoreResult<Bytes> {
        let mut state = self.state();
        state.reads.push((start, end));

        if let Some(remaining) = state.read_failures.get_mut(&start) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Network(format!(
                    "injected read failure at offset {}",
                    start
                )));
            }
        }

        let object = state
            .objects
            .get(&key_of(location))
            .ok_or_else(|| StoreError::NotFound {
                container: location.container().to_string(),
                key: location.path().to_string(),
            })?;

        let len = object.data.len() as u64;
        if start > end || start >= len {
            return Err(StoreError::Service {
                code: "InvalidRange".to_string(),
                message: format!("range {}-{} outside object of {} bytes", start, end, len),
            });
        }
        let end_exclusive = (end + 1).min(len);
        Ok(object.data.slice(start as usize..end_exclusive as usize))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<PutResult> {
        let mut state = self.state();
        state.puts += 1;
        if state.fail_puts {
            return Err(StoreError::Network("injected put failure".to_string()));
        }

        let checksum_crc32c = verify_checksum(&body, checksum)?;
        let etag = object_etag(&body);
        state.objects.insert(
            key_of(location),
            StoredObject {
                data: body,
                etag: etag.clone(),
                checksum_crc32c: checksum_crc32c.clone(),
                encryption_key: encryption.map(|e| e.key_id.clone()),
            },
        );

        Ok(PutResult {
            etag,
            checksum_crc32c,
        })
    }

    async fn begin_multipart(
        &self,
        location: &ObjectLocation,
        checksum_algorithm: Option<ChecksumAlgorithm>,
        encryption: Option<&EncryptionParams>,
    ) -> StoreResult<String> {
        let mut state = self.state();
        state.begins += 1;
        if state.fail_begin {
            return Err(StoreError::Service {
                code: "ServiceUnavailable".to_string(),
                message: "injected begin failure".to_string(),
            });
        }

        state.next_session += 1;
        let session_id = format!("mpu-{}", state.next_session);
        state.sessions.insert(
            session_id.clone(),
            Session {
                key: key_of(location),
                checksum_algorithm,
                encryption_key: encryption.map(|e| e.key_id.clone()),
                parts: BTreeMap::new(),
            },
        );
        Ok(session_id)
    }

    async fn upload_part(
        &self,
        _location: &ObjectLocation,
        session_id: &str,
        part_number: u32,
        body: Bytes,
        checksum: Option<&ChecksumParams>,
    ) -> StoreResult<String> {
        let delay = {
            let mut state = self.state();
            state.in_flight_uploads += 1;
            state.max_in_flight_uploads = state.max_in_flight_uploads.max(state.in_flight_uploads);
            state.upload_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.in_flight_uploads -= 1;

        if state.upload_failures.contains(&part_number) {
            return Err(StoreError::Network(format!(
                "injected upload failure for part {}",
                part_number
            )));
        }

        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::Service {
                code: "NoSuchUpload".to_string(),
                message: format!("unknown upload id {}", session_id),
            })?;

        if session.checksum_algorithm.is_some() && checksum.is_none() {
            return Err(StoreError::Service {
                code: "InvalidRequest".to_string(),
                message: "session requires a checksum on every part".to_string(),
            });
        }
        verify_checksum(&body, checksum)?;

        let etag = object_etag(&body);
        session.parts.insert(part_number, (body, etag.clone()));
        state.uploaded_parts.push(part_number);
        Ok(etag)
    }

    async fn complete_multipart(
        &self,
        _location: &ObjectLocation,
        session_id: &str,
        parts: &[PartResult],
    ) -> StoreResult<String> {
        let mut state = self.state();
        state.completes += 1;

        let session = state
            .sessions
            .remove(session_id)
            .ok_or_else(|| StoreError::Service {
                code: "NoSuchUpload".to_string(),
                message: format!("unknown upload id {}", session_id),
            })?;

        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::Service {
                code: "InvalidPartOrder".to_string(),
                message: "parts must be listed in ascending order".to_string(),
            });
        }

        let mut data = BytesMut::new();
        let mut tags = String::new();
        for part in parts {
            let (body, etag) =
                session
                    .parts
                    .get(&part.part_number)
                    .ok_or_else(|| StoreError::Service {
                        code: "InvalidPart".to_string(),
                        message: format!("part {} was never uploaded", part.part_number),
                    })?;
            if *etag != part.etag {
                return Err(StoreError::Service {
                    code: "InvalidPart".to_string(),
                    message: format!("etag mismatch for part {}", part.part_number),
                });
            }
            data.extend_from_slice(body);
            tags.push_str(etag);
        }

        let data = data.freeze();
        let etag = format!(
            "\"{:08x}-{}\"",
            crc32c::crc32c(tags.as_bytes()),
            parts.len()
        );
        let checksum_crc32c = session
            .checksum_algorithm
            .map(|_| format!("{}-{}", crc32c_base64(&data), parts.len()));

        state.objects.insert(
            session.key,
            StoredObject {
                data,
                etag: etag.clone(),
                checksum_crc32c,
                encryption_key: session.encryption_key,
            },
        );
        Ok(etag)
    }

    async fn abort_multipart(
        &self,
        _location: &ObjectLocation,
        session_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.state();
        state.aborts += 1;
        state.sessions.remove(session_id);
        Ok(())
    }

    async fn get_object_attributes(
        &self,
        location: &ObjectLocation,
    ) -> StoreResult<ObjectAttributes> {
        let state = self.state();
        if state.fail_attributes {
            return Err(StoreError::AccessDenied(
                "injected attributes failure".to_string(),
            ));
        }
        let object = state
            .objects
            .get(&key_of(location))
            .ok_or_else(|| StoreError::NotFound {
                container: location.container().to_string(),
                key: location.path().to_string(),
            })?;

        Ok(ObjectAttributes {
            etag: Some(object.etag.clone()),
            size: Some(state.reported_size.unwrap_or(object.data.len() as u64)),
            checksum_crc32c: object.checksum_crc32c.clone(),
        })
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str) -> ObjectLocation {
        ObjectLocation::new("mem", "bucket", path)
    }

    #[tokio::test]
    async fn test_read_range_is_inclusive() {
        let store = MemoryStore::new();
        store.insert(&loc("a"), b"0123456789".to_vec());

        let bytes = store.read_range(&loc("a"), 2, 5).await.unwrap();
        assert_eq!(&bytes[..], b"2345");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch_metadata(&loc("missing")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_read_failures_are_consumed() {
        let store = MemoryStore::new();
        store.insert(&loc("a"), b"abcdef".to_vec());
        store.fail_reads_at(0, 1);

        assert!(store.read_range(&loc("a"), 0, 2).await.is_err());
        assert!(store.read_range(&loc("a"), 0, 2).await.is_ok());
        assert_eq!(store.journal().reads.len(), 2);
    }

    #[tokio::test]
    async fn test_multipart_assembles_in_order() {
        let store = MemoryStore::new();
        let target = loc("out");
        let id = store.begin_multipart(&target, None, None).await.unwrap();

        let e2 = store
            .upload_part(&target, &id, 2, Bytes::from_static(b"world"), None)
            .await
            .unwrap();
        let e1 = store
            .upload_part(&target, &id, 1, Bytes::from_static(b"hello "), None)
            .await
            .unwrap();

        let parts = vec![
            PartResult {
                part_number: 1,
                etag: e1,
                checksum_crc32c: None,
            },
            PartResult {
                part_number: 2,
                etag: e2,
                checksum_crc32c: None,
            },
        ];
        let etag = store.complete_multipart(&target, &id, &parts).await.unwrap();

        assert!(etag.ends_with("-2\""));
        assert_eq!(&store.object(&target).unwrap()[..], b"hello world");
        assert_eq!(store.journal().open_sessions, 0);
    }

    #[tokio::test]
    async fn test_unordered_complete_rejected() {
        let store = MemoryStore::new();
        let target = loc("out");
        let id = store.begin_multipart(&target, None, None).await.unwrap();
        let parts = vec![
            PartResult {
                part_number: 2,
                etag: "x".to_string(),
                checksum_crc32c: None,
            },
            PartResult {
                part_number: 1,
                etag: "y".to_string(),
                checksum_crc32c: None,
            },
        ];
        let err = store
            .complete_multipart(&target, &id, &parts)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Service { ref code, .. } if code == "InvalidPartOrder"));
    }

    #[tokio::test]
    async fn test_bad_checksum_rejected() {
        let store = MemoryStore::new();
        let err = store
            .put_object(
                &loc("x"),
                Bytes::from_static(b"payload"),
                Some(&ChecksumParams::crc32c("AAAAAA==")),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_checksum_rejection());
    }

    #[tokio::test]
    async fn test_reported_size_override() {
        let store = MemoryStore::new();
        store.insert(&loc("a"), vec![0u8; 100]);
        store.report_size(42);

        let attrs = store.get_object_attributes(&loc("a")).await.unwrap();
        assert_eq!(attrs.size, Some(42));
    }
}
