/*!
 * Post-copy size verification
 */

use tracing::{error, info};

use super::transfer::TransferStatus;

/// Classify the copied object by comparing its size with the source's
///
/// A mismatch is a soft failure: it is logged and returned as a status, never
/// raised. A target that reports no size at all counts as a mismatch.
pub fn verify_size(expected: u64, actual: Option<u64>) -> TransferStatus {
    match actual {
        Some(actual) if actual == expected => {
            info!("Size verified: {} bytes", actual);
            TransferStatus::SizeMatched
        }
        Some(actual) => {
            error!(
                "Size mismatch: source has {} bytes, target reports {} bytes",
                expected, actual
            );
            TransferStatus::SizeMismatched
        }
        None => {
            error!(
                "Size mismatch: source has {} bytes, target reported no size",
                expected
            );
            TransferStatus::SizeMismatched
        }
    }
}
