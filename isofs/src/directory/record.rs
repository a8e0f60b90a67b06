//! Directory Record structure
//!
//! Directory records describe files and subdirectories. Records are read in
//! place from a buffered directory; [`DirectoryRecord`] is a checked view
//! over those bytes.

use crate::directory::flags::FileFlags;
use crate::error::{IsoFsError, Result};
use crate::utils::datetime::DateTime7;
use crate::utils::{both16, both32};

/// Directory Record (variable length, ECMA-119 9.1)
#[derive(Debug, Clone, Copy)]
pub struct DirectoryRecord<'a> {
    raw: &'a [u8],
    offset: u64,
}

impl<'a> DirectoryRecord<'a> {
    /// Minimum record length: fixed part plus a one byte identifier
    pub const MIN_LENGTH: usize = 34;

    /// Offset of the file identifier
    const NAME_OFFSET: usize = 33;

    /// Parse the record at the start of `data`. `offset` is its absolute
    /// byte offset, used as identity and in error reports.
    pub fn parse(data: &'a [u8], offset: u64) -> Result<Self> {
        let invalid = |reason| IsoFsError::InvalidDirectoryRecord { offset, reason };

        let length = *data.first().ok_or(invalid("empty record"))? as usize;
        if length < Self::MIN_LENGTH {
            return Err(invalid("record shorter than minimum"));
        }
        if length > data.len() {
            return Err(invalid("record crosses its sector"));
        }
        let name_len = data[32] as usize;
        if name_len == 0 || Self::NAME_OFFSET + name_len > length {
            return Err(invalid("identifier does not fit the record"));
        }

        Ok(Self {
            raw: &data[..length],
            offset,
        })
    }

    /// Absolute byte offset of the record
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total record length
    pub fn length(&self) -> usize {
        self.raw.len()
    }

    /// Extended attribute record length in logical blocks
    pub fn extended_attr_length(&self) -> u8 {
        self.raw[1]
    }

    fn checked32(&self, off: usize) -> Result<u32> {
        match both32(self.raw, off) {
            (le, be) if le == be => Ok(le),
            (le, be) => Err(IsoFsError::BothEndianMismatch {
                offset: self.offset + off as u64,
                le,
                be,
            }),
        }
    }

    /// Extent location (logical block), cross-checked against its big-endian copy
    pub fn extent_lba(&self) -> Result<u32> {
        self.checked32(2)
    }

    /// Data length in bytes, cross-checked
    pub fn data_length(&self) -> Result<u32> {
        self.checked32(10)
    }

    /// Recording date and time
    pub fn recording_time(&self) -> DateTime7 {
        let mut raw = [0u8; 7];
        raw.copy_from_slice(&self.raw[18..25]);
        DateTime7::from_bytes(&raw)
    }

    /// Raw file flags byte
    pub fn flag_bits(&self) -> u8 {
        self.raw[25]
    }

    /// Parsed file flags
    pub fn flags(&self) -> FileFlags {
        FileFlags::from_byte(self.raw[25])
    }

    /// Is this a directory?
    pub fn is_directory(&self) -> bool {
        self.raw[25] & 0x02 != 0
    }

    /// More records of the same file follow
    pub fn is_multi_extent(&self) -> bool {
        self.raw[25] & 0x80 != 0
    }

    /// Interleaved file (file unit size or gap set)
    pub fn is_interleaved(&self) -> bool {
        self.raw[26] != 0 || self.raw[27] != 0
    }

    /// Volume sequence number, cross-checked
    pub fn volume_sequence(&self) -> Result<u16> {
        match both16(self.raw, 28) {
            (le, be) if le == be => Ok(le),
            (le, be) => Err(IsoFsError::BothEndianMismatch {
                offset: self.offset + 28,
                le: le as u32,
                be: be as u32,
            }),
        }
    }

    /// Get file identifier bytes
    pub fn file_identifier(&self) -> &'a [u8] {
        let len = self.raw[32] as usize;
        &self.raw[Self::NAME_OFFSET..Self::NAME_OFFSET + len]
    }

    /// The `.` entry (identifier 0x00)
    pub fn is_self(&self) -> bool {
        self.file_identifier() == [0]
    }

    /// The `..` entry (identifier 0x01)
    pub fn is_parent(&self) -> bool {
        self.file_identifier() == [1]
    }

    /// Offset of the system use area within the record
    pub fn system_use_offset(&self) -> usize {
        let len = self.raw[32] as usize;
        Self::NAME_OFFSET + len + (1 - len % 2)
    }

    /// System use area (SUSP entries), possibly empty
    pub fn system_use(&self) -> &'a [u8] {
        self.raw.get(self.system_use_offset()..).unwrap_or(&[])
    }
}
