//! File reading and extent management

pub mod extent;
pub mod reader;

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::{IsoFsError, Result};
use crate::object::SharedCore;
use crate::types::{ObjectInfo, SeekFrom};

/// Shared state of one open file: the core and nothing else
pub(crate) struct FileShared {
    pub core: SharedCore,
}

/// File handle with its own cursor
#[derive(Clone)]
pub struct File {
    shared: Arc<FileShared>,
    position: u64,
}

impl File {
    pub(crate) fn new(shared: Arc<FileShared>) -> Self {
        Self {
            shared,
            position: 0,
        }
    }

    /// Read at the cursor and advance it
    ///
    /// Returns the number of bytes read; 0 means end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Positioned read, cursor untouched
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let core = &self.shared.core;
        reader::read_extents(
            core.volume.store(),
            &core.extents,
            core.info.size,
            offset,
            buf,
        )
    }

    /// Read the whole file into a new vector
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let size = usize::try_from(self.size()).map_err(|_| IsoFsError::OutOfMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(size)?;
        data.resize(size, 0);
        let n = self.read_at(0, &mut data)?;
        data.truncate(n);
        Ok(data)
    }

    /// Move the cursor. Positions past the end are allowed; negative ones
    /// fail with [`IsoFsError::InvalidSeek`].
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.size(), delta),
        };
        let target = base
            .checked_add_signed(delta)
            .ok_or(IsoFsError::InvalidSeek)?;
        self.position = target;
        Ok(target)
    }

    /// File size in bytes
    pub fn size(&self) -> u64 {
        self.shared.core.info.size
    }

    /// Current cursor
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File metadata
    pub fn info(&self) -> ObjectInfo {
        self.shared.core.info
    }

    /// Whether both handles refer to the same shared file
    pub fn same_object(&self, other: &File) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Handles (including this one) sharing the underlying object
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Always fails: the medium is read-only
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(IsoFsError::WriteProtected)
    }

    /// Always fails: the medium is read-only
    pub fn set_size(&mut self, _size: u64) -> Result<()> {
        Err(IsoFsError::WriteProtected)
    }
}
