//! File Identifier Descriptors (ECMA-167 4/14.4): the entries of a UDF
//! directory

use alloc::string::String;

use super::ad::LongAd;
use super::tag::{self, validate};
use crate::error::{IsoFsError, Result};
use crate::utils::le16;
use crate::utils::string::decode_osta_cs0;

/// Fixed part of a File Identifier Descriptor
pub const FID_HEADER_SIZE: usize = 38;

/// Characteristics: hidden
pub const FID_HIDDEN: u8 = 0x01;
/// Characteristics: directory
pub const FID_DIRECTORY: u8 = 0x02;
/// Characteristics: deleted
pub const FID_DELETED: u8 = 0x04;
/// Characteristics: parent directory entry
pub const FID_PARENT: u8 = 0x08;
/// Characteristics: metadata stream
pub const FID_METADATA: u8 = 0x10;

/// One decoded File Identifier Descriptor, borrowing the directory buffer
#[derive(Debug, Clone, Copy)]
pub struct FileIdentifier<'a> {
    /// Offset of the descriptor within the directory content
    pub offset: usize,
    /// Padded length of the descriptor
    pub length: usize,
    /// File characteristics
    pub flags: u8,
    /// ICB of the referenced object
    pub icb: LongAd,
    /// Raw OSTA CS0 name
    pub name: &'a [u8],
}

impl<'a> FileIdentifier<'a> {
    /// Decode the descriptor at `pos` in `data`. `base` is the absolute byte
    /// offset of `data[0]`, for diagnostics only.
    pub fn parse(data: &'a [u8], pos: usize, base: u64) -> Result<Self> {
        let offset = base + pos as u64;
        let head = data
            .get(pos..pos + FID_HEADER_SIZE)
            .ok_or(IsoFsError::InvalidDirectoryRecord {
                offset,
                reason: "truncated file identifier",
            })?;
        let name_len = head[0x13] as usize;
        let iu_len = le16(head, 0x24) as usize;
        let length = (FID_HEADER_SIZE + iu_len + name_len + 3) & !3;
        let raw = data
            .get(pos..pos + FID_HEADER_SIZE + iu_len + name_len)
            .ok_or(IsoFsError::InvalidDirectoryRecord {
                offset,
                reason: "file identifier overflows directory",
            })?;
        validate(raw, Some(tag::TAG_FILE_ID), None, offset)?;

        let name_start = FID_HEADER_SIZE + iu_len;
        Ok(Self {
            offset: pos,
            length,
            flags: raw[0x12],
            icb: LongAd::parse(&raw[0x14..]),
            name: &raw[name_start..name_start + name_len],
        })
    }

    /// Hidden from directory listings
    pub fn is_hidden(&self) -> bool {
        self.flags & FID_HIDDEN != 0
    }

    /// References a directory
    pub fn is_directory(&self) -> bool {
        self.flags & FID_DIRECTORY != 0
    }

    /// Entry was deleted
    pub fn is_deleted(&self) -> bool {
        self.flags & FID_DELETED != 0
    }

    /// The `..` entry
    pub fn is_parent(&self) -> bool {
        self.flags & FID_PARENT != 0
    }

    /// Decoded name
    pub fn name(&self) -> String {
        decode_osta_cs0(self.name)
    }
}

/// Iterator over the descriptors of a buffered directory
pub struct FidIter<'a> {
    data: &'a [u8],
    base: u64,
    pos: usize,
}

impl<'a> FidIter<'a> {
    /// Start at `pos`
    pub fn new(data: &'a [u8], base: u64, pos: usize) -> Self {
        Self { data, base, pos }
    }

    /// Offset of the next descriptor
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for FidIter<'a> {
    type Item = Result<FileIdentifier<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + FID_HEADER_SIZE > self.data.len() {
            return None;
        }
        match FileIdentifier::parse(self.data, self.pos, self.base) {
            Ok(fid) => {
                self.pos += fid.length;
                Some(Ok(fid))
            }
            Err(e) => {
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}
