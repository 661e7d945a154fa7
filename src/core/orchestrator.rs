/*!
 * Parallel copy orchestrator: drives one multipart session end-to-end
 *
 * Parts are dispatched to a bounded pool of [`PartWorker`] calls. Results land
 * in one slot per part, written only by the collecting loop, so completion
 * order never matters. The first failure stops dispatch; parts already in
 * flight are drained and their results discarded before the session is
 * aborted.
 *
 * A failing task raises a shared flag before it releases its permit, so the
 * dispatcher sees the failure as soon as it gets the next permit, even when
 * the task has not been reaped by the `JoinSet` yet.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::planner::{ByteRange, ChunkPlan};
use super::worker::PartWorker;
use crate::error::{RelayError, Result};
use crate::protocol::{ChecksumAlgorithm, PartResult};

/// Outcome of a committed multipart session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartResult {
    /// Target-assigned tag of the assembled object
    pub etag: String,
    /// Acknowledged parts, ordered by part number
    pub parts: Vec<PartResult>,
}

/// Runs a chunk plan through a bounded pool of part workers
pub struct MultipartCopier {
    worker: Arc<PartWorker>,
    max_workers: usize,
    abort_on_failure: bool,
}

type Slots = Vec<Option<PartResult>>;

impl MultipartCopier {
    pub fn new(worker: Arc<PartWorker>, max_workers: usize) -> Self {
        Self {
            worker,
            max_workers,
            abort_on_failure: true,
        }
    }

    /// Abort the session when a part fails (default: on)
    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    /// Begin a session, copy every part of `plan`, then complete the session
    ///
    /// The session is never completed after a failure.
    pub async fn run(&self, plan: &ChunkPlan) -> Result<MultipartResult> {
        let target = self.worker.target();
        let location = self.worker.target_location();
        let checksum_algorithm = self
            .worker
            .checksum_enabled()
            .then_some(ChecksumAlgorithm::Crc32c);

        let session_id = target
            .begin_multipart(location, checksum_algorithm, self.worker.encryption())
            .await
            .map_err(|source| RelayError::Session {
                operation: "Multipart begin",
                source,
            })?;
        info!(
            "Started multipart session {} for {} ({} parts)",
            session_id,
            location,
            plan.part_count()
        );

        let copied = if self.max_workers <= 1 {
            self.copy_sequential(plan.ranges(), &session_id).await
        } else {
            self.copy_concurrent(plan.ranges(), &session_id).await
        };

        let mut parts = match copied {
            Ok(parts) => parts,
            Err(e) => {
                error!(
                    "Multipart copy to {} failed ({}): {}",
                    location,
                    e.category(),
                    e
                );
                self.abandon(&session_id).await;
                return Err(e);
            }
        };

        parts.sort_by_key(|p| p.part_number);
        let etag = target
            .complete_multipart(location, &session_id, &parts)
            .await
            .map_err(|source| RelayError::Session {
                operation: "Multipart complete",
                source,
            })?;
        info!("Completed multipart session {}, etag {}", session_id, etag);

        Ok(MultipartResult { etag, parts })
    }

    async fn abandon(&self, session_id: &str) {
        if !self.abort_on_failure {
            warn!("Leaving multipart session {} open", session_id);
            return;
        }

        let location = self.worker.target_location();
        match self
            .worker
            .target()
            .abort_multipart(location, session_id)
            .await
        {
            Ok(()) => info!("Aborted multipart session {}", session_id),
            Err(e) => warn!("Failed to abort multipart session {}: {}", session_id, e),
        }
    }

    async fn copy_sequential(
        &self,
        ranges: &[ByteRange],
        session_id: &str,
    ) -> Result<Vec<PartResult>> {
        let mut slots: Slots = vec![None; ranges.len()];

        for (index, range) in ranges.iter().enumerate() {
            let part = self.worker.copy_part(*range, session_id).await?;
            slots[index] = Some(part);
        }

        collect(slots)
    }

    async fn copy_concurrent(
        &self,
        ranges: &[ByteRange],
        session_id: &str,
    ) -> Result<Vec<PartResult>> {
        let mut slots: Slots = vec![None; ranges.len()];
        let mut first_error: Option<RelayError> = None;

        // Never more permits than parts; also keeps huge worker counts under MAX_PERMITS
        let permits = self.max_workers.min(ranges.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let failed = Arc::new(AtomicBool::new(false));
        let mut join_set = JoinSet::new();

        for (index, range) in ranges.iter().copied().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RelayError::Worker(e.to_string()))?;

            while let Some(joined) = join_set.try_join_next() {
                record(joined, &mut slots, &mut first_error);
            }
            if first_error.is_some() || failed.load(Ordering::Acquire) {
                debug!("Stopping dispatch before part #{}", range.part_number);
                break;
            }

            let worker = self.worker.clone();
            let failed = failed.clone();
            let session_id = session_id.to_string();
            join_set.spawn(async move {
                let result = worker.copy_part(range, &session_id).await;
                if result.is_err() {
                    failed.store(true, Ordering::Release);
                }
                drop(permit);
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            record(joined, &mut slots, &mut first_error);
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        collect(slots)
    }
}

/// Store one finished task's result; only the first failure is kept
fn record(
    joined: std::result::Result<(usize, Result<PartResult>), tokio::task::JoinError>,
    slots: &mut Slots,
    first_error: &mut Option<RelayError>,
) {
    match joined {
        Ok((index, Ok(part))) => {
            if first_error.is_none() {
                slots[index] = Some(part);
            } else {
                debug!("Discarding part #{} finished after failure", part.part_number);
            }
        }
        Ok((_, Err(e))) => {
            if first_error.is_none() {
                *first_error = Some(e);
            } else {
                debug!("Discarding later failure: {}", e);
            }
        }
        Err(e) => {
            if first_error.is_none() {
                *first_error = Some(RelayError::Worker(e.to_string()));
            }
        }
    }
}

fn collect(slots: Slots) -> Result<Vec<PartResult>> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| RelayError::Worker(format!("no result for part #{}", index + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::protocol::{MemoryStore, ObjectLocation};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn pattern(len: u64) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn copier(store: &MemoryStore, max_workers: usize) -> (MultipartCopier, ObjectLocation) {
        let src = ObjectLocation::new("mem", "src", "big.bin");
        let dst = ObjectLocation::new("mem", "dst", "big.bin");
        let shared = Arc::new(store.clone());
        let worker = PartWorker::new(shared.clone(), shared, src, dst.clone())
            .with_retry(RetryPolicy::fixed(2, Duration::ZERO))
            .with_checksum(true);
        (MultipartCopier::new(Arc::new(worker), max_workers), dst)
    }

    fn seeded(size: u64) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(&ObjectLocation::new("mem", "src", "big.bin"), pattern(size));
        store
    }

    #[tokio::test]
    async fn test_sequential_copy() {
        let store = seeded(12 * MIB);
        let (copier, dst) = copier(&store, 1);
        let plan = ChunkPlan::new(12 * MIB, 5 * MIB).unwrap();

        let result = copier.run(&plan).await.unwrap();

        assert_eq!(result.parts.len(), 3);
        assert_eq!(store.object(&dst).unwrap().to_vec(), pattern(12 * MIB));
        assert_eq!(store.journal().uploaded_parts, vec![1, 2, 3]);
        assert_eq!(store.journal().max_in_flight_uploads, 1);
    }

    #[tokio::test]
    async fn test_concurrent_copy_is_bounded() {
        let store = seeded(40 * MIB);
        store.set_upload_delay(Duration::from_millis(20));
        let (copier, dst) = copier(&store, 3);
        let plan = ChunkPlan::new(40 * MIB, 5 * MIB).unwrap();

        let result = copier.run(&plan).await.unwrap();

        let numbers: Vec<u32> = result.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        assert_eq!(store.object(&dst).unwrap().to_vec(), pattern(40 * MIB));

        let journal = store.journal();
        assert!(journal.max_in_flight_uploads <= 3);
        assert!(journal.max_in_flight_uploads > 1);
        assert_eq!(journal.completes, 1);
    }

    #[tokio::test]
    async fn test_failure_aborts_without_complete() {
        let store = seeded(30 * MIB);
        store.fail_upload_of_part(2);
        let (copier, dst) = copier(&store, 4);
        let plan = ChunkPlan::new(30 * MIB, 5 * MIB).unwrap();

        let err = copier.run(&plan).await.unwrap_err();

        assert!(matches!(err, RelayError::TargetWrite { part: 2, .. }));
        let journal = store.journal();
        assert_eq!(journal.completes, 0);
        assert_eq!(journal.aborts, 1);
        assert_eq!(journal.open_sessions, 0);
        assert!(store.object(&dst).is_none());
    }

    #[tokio::test]
    async fn test_sequential_failure_stops_dispatch() {
        let store = seeded(30 * MIB);
        store.fail_reads_at(5 * MIB, 2);
        let (copier, _) = copier(&store, 1);
        let plan = ChunkPlan::new(30 * MIB, 5 * MIB).unwrap();

        let err = copier.run(&plan).await.unwrap_err();

        assert!(matches!(err, RelayError::SourceRead { part: 2, .. }));
        let journal = store.journal();
        assert_eq!(journal.uploaded_parts, vec![1]);
        assert_eq!(journal.completes, 0);
        assert_eq!(journal.aborts, 1);
    }

    #[tokio::test]
    async fn test_abort_can_be_disabled() {
        let store = seeded(12 * MIB);
        store.fail_upload_of_part(1);
        let (copier, _) = copier(&store, 2);
        let copier = copier.with_abort_on_failure(false);
        let plan = ChunkPlan::new(12 * MIB, 5 * MIB).unwrap();

        assert!(copier.run(&plan).await.is_err());
        let journal = store.journal();
        assert_eq!(journal.aborts, 0);
        assert_eq!(journal.completes, 0);
        assert_eq!(journal.open_sessions, 1);
    }

    #[tokio::test]
    async fn test_huge_worker_count_is_capped_by_parts() {
        let store = seeded(12 * MIB);
        let (copier, dst) = copier(&store, usize::MAX);
        let plan = ChunkPlan::new(12 * MIB, 5 * MIB).unwrap();

        let result = copier.run(&plan).await.unwrap();

        assert_eq!(result.parts.len(), 3);
        assert_eq!(store.object(&dst).unwrap().to_vec(), pattern(12 * MIB));
        assert!(store.journal().max_in_flight_uploads <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_part_stops_dispatch_on_released_permit() {
        let store = seeded(30 * MIB);
        store.fail_reads_at(0, 2);
        store.set_upload_delay(Duration::from_millis(100));
        let (copier, _) = copier(&store, 2);
        let plan = ChunkPlan::new(30 * MIB, 5 * MIB).unwrap();

        let err = copier.run(&plan).await.unwrap_err();

        assert!(matches!(err, RelayError::SourceRead { part: 1, .. }));
        // Part 1's permit is the first one released; nothing past part 2 may start
        let journal = store.journal();
        assert!(journal.reads.iter().all(|(start, _)| *start < 10 * MIB));
        assert_eq!(journal.completes, 0);
        assert_eq!(journal.aborts, 1);
    }

    #[tokio::test]
    async fn test_begin_failure_is_session_error() {
        let store = seeded(12 * MIB);
        store.fail_begin();
        let (copier, _) = copier(&store, 2);
        let plan = ChunkPlan::new(12 * MIB, 5 * MIB).unwrap();

        let err = copier.run(&plan).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Session {
                operation: "Multipart begin",
                ..
            }
        ));
        assert!(store.journal().reads.is_empty());
    }
}
