use crate::error::{Error, Result};

/// Smallest part the service accepts, except for the last part.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;
/// Largest single part.
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;
/// Largest object a multipart upload may produce.
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;
/// Most parts a single upload may carry.
pub const MAX_PART_COUNT: u64 = 10_000;

/// One contiguous byte range of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartRange {
    pub number: u32,
    pub offset: u64,
    pub len: u64,
}

/// Picks legal part sizes for multipart uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartPlanner {
    min_part_size: u64,
}

impl Default for PartPlanner {
    fn default() -> Self {
        Self {
            min_part_size: MIN_PART_SIZE,
        }
    }
}

impl PartPlanner {
    pub fn new(min_part_size: u64) -> Result<Self> {
        if min_part_size == 0 || min_part_size > MAX_PART_SIZE {
            return Err(Error::validation(format!(
                "minimum part size must be between 1 and {MAX_PART_SIZE} bytes"
            )));
        }
        Ok(Self { min_part_size })
    }

    pub fn min_part_size(&self) -> u64 {
        self.min_part_size
    }

    /// Size of every part but the last for an object of `total_size` bytes.
    ///
    /// The result is a multiple of the minimum part size and keeps the part
    /// count at or below [`MAX_PART_COUNT`].
    pub fn part_size(&self, total_size: u64) -> Result<u64> {
        if total_size > MAX_OBJECT_SIZE {
            return Err(Error::validation(format!(
                "object size {total_size} exceeds the maximum of {MAX_OBJECT_SIZE} bytes"
            )));
        }
        let per_part = total_size.div_ceil(MAX_PART_COUNT);
        let size = per_part.div_ceil(self.min_part_size) * self.min_part_size;
        Ok(size.max(self.min_part_size))
    }

    /// Part size for a stream whose length is only bounded, not known.
    pub fn worst_case_part_size(&self) -> Result<u64> {
        self.part_size(MAX_OBJECT_SIZE)
    }

    pub fn part_count(&self, total_size: u64, part_size: u64) -> u64 {
        if part_size == 0 {
            return 0;
        }
        total_size.div_ceil(part_size)
    }

    /// Contiguous ranges covering `total_size`, numbered from 1.
    pub fn ranges(&self, total_size: u64, part_size: u64) -> impl Iterator<Item = PartRange> {
        let count = self.part_count(total_size, part_size);
        (0..count).map(move |idx| {
            let offset = idx * part_size;
            PartRange {
                number: (idx + 1) as u32,
                offset,
                len: part_size.min(total_size - offset),
            }
        })
    }
}
