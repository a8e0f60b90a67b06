//! Universal Disk Format support
//!
//! Mount-time discovery of the volume descriptor sequence lives in
//! [`sequence`]; per-object metadata (ICBs) in [`icb`]; directory entries in
//! [`fid`]. This module holds the resulting volume description and the
//! logical-partition read path everything else goes through.

pub mod ad;
pub mod fid;
pub mod icb;
pub mod sequence;
pub mod tag;

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{IsoFsError, Result};
use crate::store::ByteStore;
use crate::types::SECTOR_SIZE;
use ad::LongAd;

/// Kind of a logical volume partition map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMapKind {
    /// Type 1 map: logical blocks map 1:1 onto a partition descriptor
    Plain,
    /// Virtual allocation table (write-once media)
    Virtual,
    /// Sparing table (rewritable media)
    Sparable,
    /// Metadata partition (UDF 2.50+)
    Metadata,
}

/// One resolved logical partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdfPartitionMap {
    /// Partition number (shared with the partition descriptor)
    pub number: u16,
    /// Index of the backing partition descriptor
    pub descriptor_index: usize,
    /// First sector of the partition
    pub start_sector: u32,
    /// Number of sectors
    pub sector_count: u32,
    /// Byte offset of the first sector
    pub start_byte: u64,
    /// Access type from the partition descriptor (1 = read only, ...)
    pub access_type: u32,
    /// Map kind
    pub kind: PartitionMapKind,
}

/// Volume description gathered at mount time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdfVolumeInfo {
    /// NSR level: 2 for NSR02, 3 for NSR03
    pub level: u8,
    /// Primary volume identifier
    pub volume_id: String,
    /// Logical volume identifier (what is shown as the label)
    pub logical_volume_id: String,
    /// Logical block size in bytes
    pub block_size: u32,
    /// Implementation identifier of the Implementation Use descriptor, if any
    pub implementation_id: Option<String>,
    /// Logical partitions, indexed by partition reference number
    pub partitions: Vec<UdfPartitionMap>,
    /// Location of the root directory ICB
    pub root_icb: LongAd,
}

impl UdfVolumeInfo {
    /// `log2(block_size)`
    pub fn block_shift(&self) -> u32 {
        self.block_size.trailing_zeros()
    }

    /// Absolute byte offset of `block` in logical partition `partition`
    pub fn partition_offset(&self, partition: u16, block: u32) -> Result<u64> {
        let map = self
            .partitions
            .get(partition as usize)
            .ok_or(IsoFsError::PartitionOutOfRange {
                index: partition as u32,
            })?;
        if map.kind != PartitionMapKind::Plain {
            return Err(IsoFsError::InternalError);
        }
        Ok(map.start_byte + ((block as u64) << self.block_shift()))
    }

    /// Read from a logical partition
    ///
    /// Only plain partition maps ever get here; mounting rejects the rest.
    pub fn read(
        &self,
        store: &dyn ByteStore,
        partition: u16,
        block: u32,
        offset_in_block: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        let offset = self.partition_offset(partition, block)? + offset_in_block as u64;
        store.read_at(offset, buf)
    }
}

/// Sector size used for the anchor and descriptor sequences
pub(crate) const UDF_SECTOR_SIZE: u64 = SECTOR_SIZE as u64;
