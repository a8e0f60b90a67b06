//! Directory iteration
//!
//! Walks the directory records of a fully buffered ISO 9660 directory.
//! Records never cross a sector boundary; a zero length byte pads the rest
//! of a sector.

use crate::directory::record::DirectoryRecord;
use crate::error::{IsoFsError, Result};
use crate::file::extent::ExtentList;
use crate::types::SECTOR_SIZE;

/// Iterator over single directory records
pub struct RecordIter<'a> {
    data: &'a [u8],
    extents: &'a ExtentList,
    pos: usize,
}

impl<'a> RecordIter<'a> {
    /// Iterate `data` (the directory content laid out on `extents`) from `pos`
    pub fn new(data: &'a [u8], extents: &'a ExtentList, pos: usize) -> Self {
        Self { data, extents, pos }
    }

    /// Offset of the next record within the content
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<(usize, DirectoryRecord<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }
            // Check for zero-length record (skip to next sector)
            if self.data[self.pos] == 0 {
                self.pos = (self.pos / SECTOR_SIZE + 1) * SECTOR_SIZE;
                continue;
            }

            let pos = self.pos;
            let sector_end = ((pos / SECTOR_SIZE + 1) * SECTOR_SIZE).min(self.data.len());
            let parsed = self
                .extents
                .map_offset(pos as u64)
                .ok_or(IsoFsError::InternalError)
                .and_then(|offset| DirectoryRecord::parse(&self.data[pos..sector_end], offset));
            return match parsed {
                Ok(record) => {
                    self.pos += record.length();
                    Some(Ok((pos, record)))
                }
                Err(e) => {
                    self.pos = self.data.len();
                    Some(Err(e))
                }
            };
        }
    }
}

/// One logical entry: a record, or a chain of multi-extent records
#[derive(Debug, Clone, Copy)]
pub struct IsoEntry<'a> {
    /// Content offset of the first record
    pub pos: usize,
    /// Content offset just past the last record
    pub next: usize,
    /// First record
    pub first: DirectoryRecord<'a>,
    /// Number of records in the chain
    pub parts: usize,
}

/// Iterator over logical entries, stitching multi-extent chains together
pub struct IsoEntries<'a> {
    records: RecordIter<'a>,
}

impl<'a> IsoEntries<'a> {
    /// Iterate entries starting at content offset `pos`
    pub fn new(data: &'a [u8], extents: &'a ExtentList, pos: usize) -> Self {
        Self {
            records: RecordIter::new(data, extents, pos),
        }
    }
}

impl<'a> Iterator for IsoEntries<'a> {
    type Item = Result<IsoEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (pos, first) = match self.records.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        let mut parts = 1usize;
        let mut last = first;
        while last.is_multi_extent() {
            match self.records.next() {
                Some(Ok((_, record))) if record.file_identifier() == first.file_identifier() => {
                    last = record;
                    parts += 1;
                }
                Some(Err(e)) => return Some(Err(e)),
                _ => {
                    return Some(Err(IsoFsError::InvalidDirectoryRecord {
                        offset: last.offset(),
                        reason: "broken multi-extent chain",
                    }))
                }
            }
        }
        Some(Ok(IsoEntry {
            pos,
            next: self.records.position(),
            first,
            parts,
        }))
    }
}
