/*!
 * Cross-store chunked transfer engine
 *
 * Leaf-first:
 * - `planner`: single-shot vs. multipart decision and byte-range partitions
 * - `checksum` / `verify`: CRC32C encoding and post-copy size classification
 * - `retry`: bounded fixed-delay retry for source reads
 * - `worker`: moves one byte range from source to target
 * - `orchestrator`: bounded worker pool driving one multipart session
 * - `transfer`: the controller tying it all together
 */

pub mod checksum;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod transfer;
pub mod verify;
pub mod worker;

pub use checksum::crc32c_base64;
pub use orchestrator::{MultipartCopier, MultipartResult};
pub use planner::{ByteRange, ChunkPlan, Strategy};
pub use retry::RetryPolicy;
pub use transfer::{transfer, TransferController, TransferOutcome, TransferState, TransferStatus};
pub use verify::verify_size;
pub use worker::PartWorker;

/// Objects smaller than this are always copied in one request
pub const MULTIPART_FLOOR: u64 = 5 * 1024 * 1024;

/// Maximum number of parts a multipart session accepts
pub const MAX_PARTS: u64 = 10_000;
