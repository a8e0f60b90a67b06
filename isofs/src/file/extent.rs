//! File extent management
//!
//! Extents represent contiguous data regions on disk. Offsets are absolute
//! byte offsets into the backing store, already translated through the UDF
//! partition map where one applies.

use alloc::vec::Vec;

use crate::error::Result;

/// Offset value marking an unrecorded run that reads as zeros
pub const HOLE: u64 = u64::MAX;

/// File extent (contiguous data region)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Absolute byte offset in the backing store, or [`HOLE`]
    pub offset: u64,

    /// Length in bytes
    pub length: u64,

    /// Owning UDF partition reference, `None` for ISO 9660
    pub partition: Option<u32>,
}

impl Extent {
    /// Create new extent
    pub const fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            partition: None,
        }
    }

    /// Create an unrecorded extent
    pub const fn hole(length: u64) -> Self {
        Self::new(HOLE, length)
    }

    /// Tag with a UDF partition reference
    pub const fn in_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Is this an unrecorded run?
    pub fn is_hole(&self) -> bool {
        self.offset == HOLE
    }

    /// Whether `next` continues this extent without a gap
    fn joins(&self, next: &Extent) -> bool {
        if self.partition != next.partition {
            return false;
        }
        match (self.is_hole(), next.is_hole()) {
            (true, true) => true,
            (false, false) => self.offset.checked_add(self.length) == Some(next.offset),
            _ => false,
        }
    }
}

/// Extent list of one object: the first extent inline, the rest in an
/// overflow array (most objects have exactly one extent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentList {
    first: Extent,
    rest: Vec<Extent>,
    count: usize,
}

impl ExtentList {
    /// Empty list
    pub const fn new() -> Self {
        Self {
            first: Extent::hole(0),
            rest: Vec::new(),
            count: 0,
        }
    }

    /// List holding a single extent
    pub fn single(extent: Extent) -> Self {
        Self {
            first: extent,
            rest: Vec::new(),
            count: 1,
        }
    }

    /// Append, merging with the previous extent when contiguous.
    /// Zero-length extents are only kept while the list is empty.
    pub fn push(&mut self, extent: Extent) -> Result<()> {
        if self.count == 0 {
            self.first = extent;
            self.count = 1;
            return Ok(());
        }
        if extent.length == 0 {
            return Ok(());
        }
        let last = self.last_mut();
        if last.length == 0 {
            *last = extent;
            return Ok(());
        }
        if last.joins(&extent) {
            last.length += extent.length;
            return Ok(());
        }
        self.rest.try_reserve(1)?;
        self.rest.push(extent);
        self.count += 1;
        Ok(())
    }

    fn last_mut(&mut self) -> &mut Extent {
        match self.rest.last_mut() {
            Some(last) => last,
            None => &mut self.first,
        }
    }

    /// Number of extents
    pub fn len(&self) -> usize {
        self.count
    }

    /// No extents at all?
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate in file-offset order
    pub fn iter(&self) -> impl Iterator<Item = &Extent> {
        core::iter::once(&self.first)
            .take(self.count.min(1))
            .chain(self.rest.iter())
    }

    /// Sum of all extent lengths
    pub fn total_length(&self) -> u64 {
        self.iter().map(|e| e.length).sum()
    }

    /// Translate a logical offset into a backing-store offset.
    /// `None` past the end or inside a hole.
    pub fn map_offset(&self, logical: u64) -> Option<u64> {
        let mut start = 0u64;
        for extent in self.iter() {
            if logical < start + extent.length {
                return (!extent.is_hole()).then(|| extent.offset + (logical - start));
            }
            start += extent.length;
        }
        None
    }

    /// Make the extents sum to exactly `size`: trim surplus allocation and
    /// cover a missing tail with a hole
    pub fn fit_to(&mut self, size: u64) -> Result<()> {
        let mut covered = 0u64;
        let mut keep = 0usize;
        for extent in self.iter() {
            if covered >= size && keep > 0 {
                break;
            }
            keep += 1;
            covered += extent.length;
        }
        if keep < self.count {
            self.rest.truncate(keep.saturating_sub(1));
            self.count = keep;
        }
        if covered > size {
            let excess = covered - size;
            self.last_mut().length -= excess;
        } else if covered < size {
            let hole = match self.iter().last().and_then(|e| e.partition) {
                Some(p) => Extent::hole(size - covered).in_partition(p),
                None => Extent::hole(size - covered),
            };
            self.push(hole)?;
        }
        Ok(())
    }
}

impl Default for ExtentList {
    fn default() -> Self {
        Self::new()
    }
}
