//! UDF descriptor tag (ECMA-167 3/7.2)
//!
//! Every UDF descriptor starts with a 16 byte tag carrying its identifier,
//! a checksum over the tag itself, the sector it was written to and a CRC
//! over the descriptor body.

use crate::error::{IsoFsError, Result};
use crate::utils::checksum::{tag_checksum, tag_crc};
use crate::utils::{le16, le32};

/// Primary Volume Descriptor
pub const TAG_PRIMARY_VOLUME: u16 = 0x0001;
/// Anchor Volume Descriptor Pointer
pub const TAG_ANCHOR_POINTER: u16 = 0x0002;
/// Volume Descriptor Pointer
pub const TAG_VOLUME_POINTER: u16 = 0x0003;
/// Implementation Use Volume Descriptor
pub const TAG_IMPLEMENTATION_USE: u16 = 0x0004;
/// Partition Descriptor
pub const TAG_PARTITION: u16 = 0x0005;
/// Logical Volume Descriptor
pub const TAG_LOGICAL_VOLUME: u16 = 0x0006;
/// Unallocated Space Descriptor
pub const TAG_UNALLOCATED_SPACE: u16 = 0x0007;
/// Terminating Descriptor
pub const TAG_TERMINATING: u16 = 0x0008;
/// Logical Volume Integrity Descriptor
pub const TAG_LOGICAL_VOLUME_INTEGRITY: u16 = 0x0009;
/// File Set Descriptor
pub const TAG_FILE_SET: u16 = 0x0100;
/// File Identifier Descriptor
pub const TAG_FILE_ID: u16 = 0x0101;
/// Allocation Extent Descriptor
pub const TAG_ALLOCATION_EXTENT: u16 = 0x0102;
/// Indirect Entry
pub const TAG_INDIRECT_ENTRY: u16 = 0x0103;
/// Terminal Entry
pub const TAG_TERMINAL_ENTRY: u16 = 0x0104;
/// File Entry
pub const TAG_FILE_ENTRY: u16 = 0x0105;
/// Unallocated Space Entry
pub const TAG_UNALLOCATED_SPACE_ENTRY: u16 = 0x0107;
/// Extended File Entry
pub const TAG_EXTENDED_FILE_ENTRY: u16 = 0x010a;

/// Parsed descriptor tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Tag identifier
    pub id: u16,
    /// Descriptor version (2 = NSR02, 3 = NSR03)
    pub version: u16,
    /// Tag checksum as recorded
    pub checksum: u8,
    /// Tag serial number
    pub serial: u16,
    /// Descriptor CRC as recorded
    pub crc: u16,
    /// Number of body bytes covered by the CRC
    pub crc_length: u16,
    /// Sector the descriptor claims to live at
    pub location: u32,
}

impl Tag {
    /// Size of the tag on disk
    pub const SIZE: usize = 16;

    /// Decode the first 16 bytes of `buf` without validating anything
    pub fn parse(buf: &[u8]) -> Self {
        Self {
            id: le16(buf, 0),
            version: le16(buf, 2),
            checksum: buf[4],
            serial: le16(buf, 6),
            crc: le16(buf, 8),
            crc_length: le16(buf, 10),
            location: le32(buf, 12),
        }
    }
}

/// Validate the tag at the start of `buf`
///
/// Checks run in a fixed order: checksum, version, identifier (when
/// `expected_id` is given), location (when `location` is given) and finally
/// the CRC over `crc_length` body bytes. `offset` is the absolute byte
/// offset of `buf`, used for error reporting only.
pub fn validate(
    buf: &[u8],
    expected_id: Option<u16>,
    location: Option<u32>,
    offset: u64,
) -> Result<Tag> {
    if buf.len() < Tag::SIZE {
        return Err(IsoFsError::InvalidDescriptor {
            offset,
            reason: "descriptor shorter than its tag",
        });
    }
    let tag = Tag::parse(buf);

    let actual = tag_checksum(&buf[..Tag::SIZE]);
    if actual != tag.checksum {
        return Err(IsoFsError::TagChecksumMismatch {
            offset,
            expected: tag.checksum,
            actual,
        });
    }

    if tag.version != 2 && tag.version != 3 {
        return Err(IsoFsError::UnsupportedVersion {
            offset,
            version: tag.version as u8,
        });
    }

    if let Some(expected) = expected_id {
        if tag.id != expected {
            return Err(IsoFsError::TagIdMismatch {
                offset,
                expected,
                actual: tag.id,
            });
        }
    }

    if let Some(expected) = location {
        if tag.location != expected {
            return Err(IsoFsError::TagLocationMismatch {
                offset,
                expected,
                actual: tag.location,
            });
        }
    }

    let end = Tag::SIZE + tag.crc_length as usize;
    if end > buf.len() {
        return Err(IsoFsError::InvalidDescriptor {
            offset,
            reason: "descriptor CRC length exceeds descriptor",
        });
    }
    let crc = tag_crc(&buf[Tag::SIZE..end]);
    if crc != tag.crc {
        return Err(IsoFsError::TagCrcMismatch {
            offset,
            expected: tag.crc,
            actual: crc,
        });
    }

    Ok(tag)
}

/// Stamp a tag onto `buf`: fills in CRC and checksum for a body of
/// `crc_length` bytes. Used by the test image builders.
#[cfg(test)]
pub(crate) fn stamp(buf: &mut [u8], id: u16, location: u32, crc_length: u16) {
    buf[0..2].copy_from_slice(&id.to_le_bytes());
    buf[2..4].copy_from_slice(&3u16.to_le_bytes());
    buf[10..12].copy_from_slice(&crc_length.to_le_bytes());
    buf[12..16].copy_from_slice(&location.to_le_bytes());
    let crc = tag_crc(&buf[Tag::SIZE..Tag::SIZE + crc_length as usize]);
    buf[8..10].copy_from_slice(&crc.to_le_bytes());
    buf[4] = 0;
    buf[4] = tag_checksum(&buf[..Tag::SIZE]);
}
