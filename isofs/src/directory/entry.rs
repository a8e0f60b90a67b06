//! Locating and decoding the entries of a buffered directory
//!
//! ISO 9660 directories are walked record by record (multi-extent chains
//! count as one entry); UDF directories File Identifier by File Identifier.
//! Locating is cheap and only yields the on-disk identity; decoding builds
//! the full metadata and extent list.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use tracing::warn;

use super::iterator::{IsoEntries, RecordIter};
use super::name::{self, NameEncoding};
use super::record::DirectoryRecord;
use super::DirShared;
use crate::error::{IsoFsError, Result};
use crate::extensions::rock_ridge::{RockRidgeInfo, SuspScanner};
use crate::file::extent::{Extent, ExtentList};
use crate::file::reader::read_extents;
use crate::object::ObjectKey;
use crate::types::{mode, ObjectInfo, MAX_NAME_LENGTH};
use crate::udf::ad::LongAd;
use crate::udf::fid::{FidIter, FileIdentifier};
use crate::udf::icb::{decode_symlink, read_icb, UdfObject};
use crate::udf::UdfVolumeInfo;
use crate::utils::datetime::Timestamp;

/// Largest UDF symlink body we decode
const MAX_SYMLINK_DATA: u64 = 4 * MAX_NAME_LENGTH as u64;

/// Position and identity of one entry
#[derive(Debug, Clone, Copy)]
pub(crate) struct Located {
    /// Identity within the directory
    pub key: ObjectKey,
    /// Content offset of the entry
    pub pos: usize,
    /// Content offset of the following entry
    pub next: usize,
    /// Format specific location
    pub kind: LocatedKind,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum LocatedKind {
    /// Chain of `parts` directory records
    Iso { parts: usize },
    /// File Identifier Descriptor
    Udf { icb: LongAd, flags: u8 },
}

/// Fully decoded entry
#[derive(Debug)]
pub(crate) struct Decoded {
    pub name: String,
    pub info: ObjectInfo,
    pub extents: ExtentList,
    /// Symlink target, when the entry is a symlink. A target longer than
    /// the supported maximum is kept as the error `read_link` reports.
    pub symlink: Option<Result<Vec<u8>>>,
    /// ISO 9660 interleaved file
    pub interleaved: bool,
}

impl DirShared {
    fn udf(&self) -> Result<&UdfVolumeInfo> {
        self.core.volume.udf.as_ref().ok_or(IsoFsError::InternalError)
    }

    fn rock_ridge(&self, record: &DirectoryRecord<'_>) -> Option<RockRidgeInfo> {
        let volume = &self.core.volume;
        let skip = volume.rock_ridge?;
        let scanner = SuspScanner::new(
            volume.store(),
            &volume.scratch,
            volume.block_size as u64,
            skip,
        );
        let info = scanner.scan(record);
        info.is_valid().then_some(info)
    }

    /// Encoding of the raw 8/16-bit identifiers
    fn identifier_encoding(&self) -> NameEncoding {
        match self.core.volume.encoding {
            NameEncoding::Utf16Be => NameEncoding::Utf16Be,
            NameEncoding::Ascii | NameEncoding::RockRidge => NameEncoding::Ascii,
        }
    }

    /// Find the entry called `name`
    pub(crate) fn locate(&self, name: &str) -> Result<Option<Located>> {
        if self.core.volume.udf.is_some() {
            for fid in FidIter::new(&self.content, 0, 0) {
                let fid = fid?;
                if fid.is_parent() || fid.is_deleted() {
                    continue;
                }
                if fid.name() == name {
                    return Ok(Some(udf_located(&fid)));
                }
            }
            return Ok(None);
        }

        let encoding = self.identifier_encoding();
        for entry in IsoEntries::new(&self.content, &self.core.extents, 0) {
            let entry = entry?;
            let record = entry.first;
            if record.is_self() || record.is_parent() {
                continue;
            }
            let rr_match = self.rock_ridge(&record).is_some_and(|rr| {
                rr.alternate_name()
                    .is_some_and(|alt| name::matches(name, alt, NameEncoding::RockRidge, false))
            });
            if rr_match
                || name::matches(name, record.file_identifier(), encoding, record.is_directory())
            {
                return Ok(Some(Located {
                    key: record.offset(),
                    pos: entry.pos,
                    next: entry.next,
                    kind: LocatedKind::Iso { parts: entry.parts },
                }));
            }
        }
        Ok(None)
    }

    /// First reportable entry at or after content offset `pos`
    pub(crate) fn locate_next(&self, pos: usize) -> Result<Option<Located>> {
        if self.core.volume.udf.is_some() {
            for fid in FidIter::new(&self.content, 0, pos) {
                let fid = fid?;
                if !fid.is_parent() {
                    return Ok(Some(udf_located(&fid)));
                }
            }
            return Ok(None);
        }

        for entry in IsoEntries::new(&self.content, &self.core.extents, pos) {
            let entry = entry?;
            if entry.first.is_self() || entry.first.is_parent() {
                continue;
            }
            return Ok(Some(Located {
                key: entry.first.offset(),
                pos: entry.pos,
                next: entry.next,
                kind: LocatedKind::Iso { parts: entry.parts },
            }));
        }
        Ok(None)
    }

    /// Build metadata and extents for a located entry
    pub(crate) fn decode(&self, loc: &Located) -> Result<Decoded> {
        match loc.kind {
            LocatedKind::Iso { parts } => self.decode_iso(loc, parts),
            LocatedKind::Udf { icb, flags } => self.decode_udf(loc, icb, flags),
        }
    }

    fn decode_iso(&self, loc: &Located, parts: usize) -> Result<Decoded> {
        let block_size = self.core.volume.block_size as u64;
        let mut records = RecordIter::new(&self.content, &self.core.extents, loc.pos);
        let mut extents = ExtentList::new();
        let mut size = 0u64;
        let mut allocated = 0u64;
        let mut interleaved = false;
        let mut first: Option<DirectoryRecord<'_>> = None;

        for _ in 0..parts {
            let (_, record) = records.next().ok_or(IsoFsError::InternalError)??;
            let length = record.data_length()? as u64;
            let block = record.extent_lba()? as u64 + record.extended_attr_length() as u64;
            extents.push(Extent::new(block * block_size, length))?;
            size += length;
            allocated += length.div_ceil(block_size) * block_size;
            interleaved |= record.is_interleaved();
            first.get_or_insert(record);
        }
        let record = first.ok_or(IsoFsError::InternalError)?;
        extents.fit_to(size)?;

        let is_directory = record.is_directory();
        let encoding = self.identifier_encoding();
        let recorded = record.recording_time();
        let time = if recorded.is_valid() {
            recorded.to_timestamp()
        } else {
            Timestamp::EPOCH
        };
        let mut info = ObjectInfo {
            size,
            allocated,
            access: time,
            modify: time,
            change: time,
            birth: time,
            mode: if is_directory {
                mode::S_IFDIR | 0o555
            } else {
                mode::S_IFREG | 0o444
            },
            inode: loc.key,
            version: if is_directory {
                0
            } else {
                name::version_of(record.file_identifier(), encoding)
            },
            hidden: record.flags().hidden,
            ..ObjectInfo::default()
        };

        let mut name = name::decode(record.file_identifier(), encoding, is_directory);
        let mut symlink = None;
        if let Some(rr) = self.rock_ridge(&record) {
            rr.apply(&mut info);
            if let Some(alt) = rr.alternate_name() {
                name = name::decode(alt, NameEncoding::RockRidge, is_directory);
            } else if rr.name_overflow {
                warn!("rock ridge: NM name of record {} too long, using identifier", loc.key);
            }
            if rr.symlink_overflow {
                symlink = Some(Err(IsoFsError::NameTooLong));
            } else if rr.has_symlink {
                symlink = Some(Ok(rr.symlink));
            }
        }

        Ok(Decoded {
            name,
            info,
            extents,
            symlink,
            interleaved,
        })
    }

    fn decode_udf(&self, loc: &Located, icb: LongAd, flags: u8) -> Result<Decoded> {
        let udf = self.udf()?;
        let store = self.core.volume.store();
        let fid = FileIdentifier::parse(&self.content, loc.pos, 0)?;
        let deleted = fid.is_deleted();

        let object: UdfObject = match read_icb(store, udf, icb, deleted) {
            Ok(object) => object,
            Err(e) if deleted => {
                warn!("udf: deleted entry {:?} has an unreadable ICB: {}", fid.name(), e);
                read_icb(store, udf, LongAd::default(), true)?
            }
            Err(e) => return Err(e),
        };

        let mut info = object.info;
        info.hidden = flags & crate::udf::fid::FID_HIDDEN != 0;

        let symlink = if info.is_symlink() && !object.whiteout {
            if info.size > MAX_SYMLINK_DATA {
                Some(Err(IsoFsError::NameTooLong))
            } else {
                let mut data = vec![0u8; info.size as usize];
                let n = read_extents(store, &object.extents, info.size, 0, &mut data)?;
                data.truncate(n);
                Some(Ok(decode_symlink(&data)?.into_bytes()))
            }
        } else {
            None
        };

        Ok(Decoded {
            name: fid.name(),
            info,
            extents: object.extents,
            symlink,
            interleaved: false,
        })
    }
}

fn udf_located(fid: &FileIdentifier<'_>) -> Located {
    Located {
        key: fid.offset as ObjectKey,
        pos: fid.offset,
        next: fid.offset + fid.length,
        kind: LocatedKind::Udf {
            icb: fid.icb,
            flags: fid.flags,
        },
    }
}
