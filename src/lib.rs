/*!
 * blobrelay - chunked, parallel, checksum-verified object copy
 *
 * Copies one object from a ranged-read source store (Google Cloud Storage)
 * into a multipart-upload target store (Amazon S3):
 * - single-shot vs. multipart planning with exact byte-range arithmetic
 * - bounded parallel part workers with fail-fast and session abort
 * - optional CRC32C checksums attached to every write
 * - post-copy size verification
 *
 * Storage is consumed through the `SourceStore` / `TargetStore` traits, so the
 * engine runs unchanged against the in-memory store used by the tests.
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod request;

// Re-export commonly used types
pub use batch::{run_batch, BatchPayload, BatchResponse, BatchResult};
pub use config::{LogLevel, RelayConfig};
pub use core::{transfer, TransferController, TransferOutcome, TransferStatus};
pub use error::{RelayError, Result};
pub use protocol::{MemoryStore, ObjectLocation, SourceStore, TargetStore};
pub use request::{Flag, TransferRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
