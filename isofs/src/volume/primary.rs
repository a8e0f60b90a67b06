//! Primary Volume Descriptor parsing
//!
//! The Primary Volume Descriptor (PVD) is always present and describes
//! the basic ISO9660 filesystem structure. Supplementary descriptors share
//! the layout, so they are parsed with the same code.

use crate::directory::record::DirectoryRecord;
use crate::error::{IsoFsError, Result};
use crate::types::SECTOR_SIZE;
use crate::utils::datetime::DateTime17;
use crate::utils::{both16, both32};

/// Standard identifier of ISO 9660 volume descriptors
pub const STANDARD_ID: &[u8; 5] = b"CD001";

/// Largest logical block size, in sectors
const MAX_BLOCK_SECTORS: u32 = 128;

/// Both-endian 32-bit value (stored as LE then BE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BothEndian32 {
    /// Little-endian value
    pub le: u32,
    /// Big-endian value
    pub be: u32,
}

impl BothEndian32 {
    fn read(buf: &[u8], off: usize) -> Self {
        let (le, be) = both32(buf, off);
        Self { le, be }
    }

    /// Get value (uses little-endian)
    pub fn get(&self) -> u32 {
        self.le
    }

    /// Get value, failing when the two copies disagree
    pub fn checked(&self, offset: u64) -> Result<u32> {
        if self.le != self.be {
            return Err(IsoFsError::BothEndianMismatch {
                offset,
                le: self.le,
                be: self.be,
            });
        }
        Ok(self.le)
    }
}

/// Both-endian 16-bit value (stored as LE then BE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BothEndian16 {
    /// Little-endian value
    pub le: u16,
    /// Big-endian value
    pub be: u16,
}

impl BothEndian16 {
    fn read(buf: &[u8], off: usize) -> Self {
        let (le, be) = both16(buf, off);
        Self { le, be }
    }

    /// Get value (uses little-endian)
    pub fn get(&self) -> u16 {
        self.le
    }

    /// Get value, failing when the two copies disagree
    pub fn checked(&self, offset: u64) -> Result<u16> {
        if self.le != self.be {
            return Err(IsoFsError::BothEndianMismatch {
                offset,
                le: self.le as u32,
                be: self.be as u32,
            });
        }
        Ok(self.le)
    }
}

/// Primary (type 1) or Supplementary (type 2) Volume Descriptor
///
/// See ECMA-119 8.4 / 8.5
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    /// Absolute byte offset of the descriptor
    pub offset: u64,
    /// Type code (1 primary, 2 supplementary)
    pub type_code: u8,
    /// Descriptor version
    pub version: u8,
    /// Volume flags (supplementary only)
    pub flags: u8,
    /// System identifier
    pub system_id: [u8; 32],
    /// Volume identifier
    pub volume_id: [u8; 32],
    /// Volume space size in logical blocks
    pub volume_space_size: BothEndian32,
    /// Escape sequences (supplementary only, selects Joliet)
    pub escape_sequences: [u8; 32],
    /// Volume set size
    pub volume_set_size: BothEndian16,
    /// Volume sequence number
    pub volume_sequence_number: BothEndian16,
    /// Logical block size
    pub logical_block_size: BothEndian16,
    /// Root directory record (34 bytes)
    pub root_directory_record: [u8; 34],
    /// Volume creation time
    pub creation_time: Option<DateTime17>,
    /// Volume modification time
    pub modification_time: Option<DateTime17>,
    /// File structure version
    pub file_structure_version: u8,
}

/// Root directory location extracted from a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootDirectory {
    /// Logical block of the root directory extent
    pub extent: u32,
    /// Size of the root directory in bytes
    pub size: u32,
    /// Absolute byte offset of the root record inside the descriptor
    pub record_offset: u64,
}

fn copy<const N: usize>(data: &[u8], off: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[off..off + N]);
    out
}

impl PrimaryVolumeDescriptor {
    /// Volume space size, checked
    pub fn space_size(&self) -> Result<u32> {
        self.volume_space_size.checked(self.offset + 80)
    }

    /// Volume set size, checked
    pub fn set_size(&self) -> Result<u16> {
        self.volume_set_size.checked(self.offset + 120)
    }

    /// Volume sequence number, checked
    pub fn sequence_number(&self) -> Result<u16> {
        self.volume_sequence_number.checked(self.offset + 124)
    }

    /// Logical block size: a power of two, a multiple of the sector size,
    /// at most 128 sectors
    pub fn block_size(&self) -> Result<u32> {
        let size = self.logical_block_size.checked(self.offset + 128)? as u32;
        let sector = SECTOR_SIZE as u32;
        if !size.is_power_of_two() || size % sector != 0 || size > sector * MAX_BLOCK_SECTORS {
            return Err(IsoFsError::InvalidBlockSize { size });
        }
        Ok(size)
    }

    /// Validate the embedded root directory record
    pub fn root(&self) -> Result<RootDirectory> {
        let record_offset = self.offset + 156;
        let invalid = |reason| IsoFsError::InvalidRootDirectory {
            offset: record_offset,
            reason,
        };
        let record = DirectoryRecord::parse(&self.root_directory_record, record_offset)
            .map_err(|_| invalid("malformed record"))?;

        if !record.is_directory() {
            return Err(invalid("not a directory"));
        }
        if record.is_multi_extent() {
            return Err(invalid("multi-extent root directory"));
        }
        let size = record.data_length()?;
        if size == 0 {
            return Err(invalid("empty root directory"));
        }
        let extent = record.extent_lba()?;
        if extent == 0 {
            return Err(invalid("root directory has no extent"));
        }
        if record.volume_sequence()? != self.sequence_number()? {
            return Err(invalid("volume sequence number differs from the descriptor"));
        }

        Ok(RootDirectory {
            extent,
            size,
            record_offset,
        })
    }
}

/// Parse a Primary or Supplementary Volume Descriptor from sector data
pub fn parse(data: &[u8], offset: u64) -> Result<PrimaryVolumeDescriptor> {
    if data.len() < SECTOR_SIZE {
        return Err(IsoFsError::InvalidDescriptor {
            offset,
            reason: "short volume descriptor",
        });
    }
    if &data[1..6] != STANDARD_ID {
        return Err(IsoFsError::InvalidDescriptor {
            offset,
            reason: "missing CD001 identifier",
        });
    }
    if data[6] != 1 {
        return Err(IsoFsError::UnsupportedVersion {
            offset,
            version: data[6],
        });
    }

    let pvd = PrimaryVolumeDescriptor {
        offset,
        type_code: data[0],
        version: data[6],
        flags: data[7],
        system_id: copy(data, 8),
        volume_id: copy(data, 40),
        volume_space_size: BothEndian32::read(data, 80),
        escape_sequences: copy(data, 88),
        volume_set_size: BothEndian16::read(data, 120),
        volume_sequence_number: BothEndian16::read(data, 124),
        logical_block_size: BothEndian16::read(data, 128),
        root_directory_record: copy(data, 156),
        creation_time: DateTime17::from_bytes(&copy(data, 813)),
        modification_time: DateTime17::from_bytes(&copy(data, 830)),
        file_structure_version: data[881],
    };

    if pvd.file_structure_version != 1 {
        return Err(IsoFsError::UnsupportedVersion {
            offset: offset + 881,
            version: pvd.file_structure_version,
        });
    }
    Ok(pvd)
}
