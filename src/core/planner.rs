/*!
 * Chunk planning: single-shot vs. multipart, and byte-range partitions
 */

use std::fmt;

use super::{MAX_PARTS, MULTIPART_FLOOR};
use crate::error::{RelayError, Result};

/// One inclusive byte range of the source object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// 1-based part number
    pub part_number: u32,
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; 0 when `end < start`
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// Copy strategy chosen for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One read and one put
    SingleShot,
    /// Parallel ranged parts assembled by a multipart session
    Multipart,
}

/// Ordered, contiguous, non-overlapping ranges covering one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    object_size: u64,
    chunk_size: u64,
    ranges: Vec<ByteRange>,
}

impl ChunkPlan {
    /// Plan the copy of an object of `object_size` bytes
    ///
    /// Objects below 5 MiB, or no larger than one chunk, get a single range
    /// (none at all for an empty object). Larger objects are split into
    /// `ceil(object_size / chunk_size)` ranges of `chunk_size` bytes, the last
    /// one holding the remainder.
    pub fn new(object_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RelayError::Planning(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        if object_size < MULTIPART_FLOOR || object_size <= chunk_size {
            let ranges = if object_size == 0 {
                Vec::new()
            } else {
                vec![ByteRange {
                    part_number: 1,
                    start: 0,
                    end: object_size - 1,
                }]
            };
            return Ok(Self {
                object_size,
                chunk_size,
                ranges,
            });
        }

        let parts = object_size.div_ceil(chunk_size);
        if parts > MAX_PARTS {
            return Err(RelayError::Planning(format!(
                "{} bytes in {}-byte chunks needs {} parts (limit {}); use a chunk size of at least {} bytes",
                object_size,
                chunk_size,
                parts,
                MAX_PARTS,
                object_size.div_ceil(MAX_PARTS)
            )));
        }

        let ranges = (0..parts)
            .map(|i| ByteRange {
                part_number: (i + 1) as u32,
                start: i * chunk_size,
                end: ((i + 1) * chunk_size).min(object_size) - 1,
            })
            .collect();

        Ok(Self {
            object_size,
            chunk_size,
            ranges,
        })
    }

    pub fn strategy(&self) -> Strategy {
        if self.ranges.len() > 1 {
            Strategy::Multipart
        } else {
            Strategy::SingleShot
        }
    }

    pub fn is_single_shot(&self) -> bool {
        self.strategy() == Strategy::SingleShot
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn part_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn object_size(&self) -> u64 {
        self.object_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}
