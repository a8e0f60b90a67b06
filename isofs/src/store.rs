//! Backing store access
//!
//! The driver only ever needs positioned reads and the total size. Block
//! devices from the `gpt_disk_io` stack are adapted through [`BlockDevice`];
//! in-memory images can be handed over as a plain `Vec<u8>`.

use alloc::vec;
use alloc::vec::Vec;

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use crate::error::{IsoFsError, Result};

/// Random-access, read-only byte store holding the image
///
/// Implementations must not rely on an implicit cursor: concurrent calls
/// for different regions have to be safe.
pub trait ByteStore: Send + Sync {
    /// Fill `buf` from `offset`. A short read is an error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size in bytes
    fn size(&self) -> u64;
}

impl ByteStore for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset).map_err(|_| IsoFsError::IoError { offset })?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.len())
            .ok_or(IsoFsError::IoError { offset })?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Byte-addressed view of a block device
///
/// Offsets are relative to `start_lba`, so an image stored inside a partition
/// can be mounted directly. `BlockIo` needs `&mut self` for reads, so the
/// device sits behind a lock.
pub struct BlockDevice<B: BlockIo> {
    device: spin::Mutex<B>,
    start_lba: u64,
    block_size: u64,
    size: u64,
}

impl<B: BlockIo> BlockDevice<B> {
    /// Wrap `block_io`, treating `start_lba` as byte offset zero
    pub fn new(mut block_io: B, start_lba: u64) -> Result<Self> {
        let block_size = block_io.block_size().to_u32() as u64;
        if block_size == 0 {
            return Err(IsoFsError::InternalError);
        }
        let num_blocks = block_io
            .num_blocks()
            .map_err(|_| IsoFsError::IoError { offset: 0 })?;
        let size = num_blocks.saturating_sub(start_lba) * block_size;

        Ok(Self {
            device: spin::Mutex::new(block_io),
            start_lba,
            block_size,
            size,
        })
    }

    /// Give the device back
    pub fn into_inner(self) -> B {
        self.device.into_inner()
    }

    /// Device block size in bytes
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

impl<B: BlockIo + Send> ByteStore for BlockDevice<B> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match offset.checked_add(buf.len() as u64) {
            Some(end) if end <= self.size => {}
            _ => return Err(IsoFsError::IoError { offset }),
        }

        let bs = self.block_size;
        let mut device = self.device.lock();
        let mut bounce: Vec<u8> = Vec::new();
        let mut pos = offset;
        let mut done = 0usize;

        while done < buf.len() {
            let lba = Lba(self.start_lba + pos / bs);
            let in_block = (pos % bs) as usize;
            let remaining = buf.len() - done;

            if in_block == 0 && remaining as u64 >= bs {
                // Whole blocks go straight into the caller's buffer
                let whole = (remaining as u64 / bs * bs) as usize;
                device
                    .read_blocks(lba, &mut buf[done..done + whole])
                    .map_err(|_| IsoFsError::IoError { offset: pos })?;
                done += whole;
                pos += whole as u64;
            } else {
                if bounce.is_empty() {
                    bounce = vec![0u8; bs as usize];
                }
                device
                    .read_blocks(lba, &mut bounce)
                    .map_err(|_| IsoFsError::IoError { offset: pos })?;
                let n = (bs as usize - in_block).min(remaining);
                buf[done..done + n].copy_from_slice(&bounce[in_block..in_block + n]);
                done += n;
                pos += n as u64;
            }
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}
