//! ICB resolution: File Entries, Extended File Entries and the indirect
//! entries that may chain them
//!
//! An ICB is read block by block. Each block carries its own descriptor tag.
//! Indirect entries in the last block of an ICB are followed in a loop;
//! anywhere else they are followed by recursion. Both paths share one
//! [`IcbContext`], so a cyclic or absurdly deep chain fails with
//! [`IsoFsError::IcbTooDeep`] or [`IsoFsError::TooManyIndirections`].

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use tracing::{trace, warn};

use super::ad::{AdForm, AdKind, LongAd};
use super::tag::{self, validate};
use super::UdfVolumeInfo;
use crate::error::{IsoFsError, Result};
use crate::file::extent::{Extent, ExtentList};
use crate::store::ByteStore;
use crate::types::{mode, ObjectInfo};
use crate::utils::datetime::{Timestamp, UdfTimestamp};
use crate::utils::string::decode_osta_cs0;
use crate::utils::{le16, le32, le64};

/// Smallest ICB: descriptor tag plus ICB tag
pub const MIN_ICB_SIZE: u32 = 36;

/// Largest ICB we read
pub const MAX_ICB_SIZE: u32 = 64 * 1024;

/// Nesting limit for indirect entries followed by recursion
pub const MAX_ICB_DEPTH: u32 = 8;

/// Total indirect entries followed while resolving one object
pub const MAX_INDIRECTIONS: u32 = 32;

/// Allocation Extent Descriptors followed while decoding one object
pub const MAX_AD_CONTINUATIONS: u32 = 64;

const FILE_TYPE_DIRECTORY: u8 = 4;
const FILE_TYPE_REGULAR: u8 = 5;
const FILE_TYPE_BLOCK_DEVICE: u8 = 6;
const FILE_TYPE_CHAR_DEVICE: u8 = 7;
const FILE_TYPE_FIFO: u8 = 9;
const FILE_TYPE_SOCKET: u8 = 10;
const FILE_TYPE_SYMLINK: u8 = 12;

const ICB_FLAG_SETUID: u16 = 0x0040;
const ICB_FLAG_SETGID: u16 = 0x0080;
const ICB_FLAG_STICKY: u16 = 0x0100;

/// Budget shared by every step of one ICB resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct IcbContext {
    /// Current recursion depth
    pub depth: u32,
    /// Indirect entries followed so far
    pub indirections: u32,
}

/// Metadata and layout of one UDF object
#[derive(Debug, Clone)]
pub struct UdfObject {
    /// Decoded metadata
    pub info: ObjectInfo,
    /// Data extents, summing to `info.size`
    pub extents: ExtentList,
    /// No file entry was found for a deleted identifier
    pub whiteout: bool,
}

#[derive(Default)]
struct Collector {
    info: ObjectInfo,
    extents: ExtentList,
    entries: u32,
}

/// Resolve the ICB at `location`
///
/// `deleted` is the deleted flag of the File Identifier Descriptor that
/// referenced it; such entries come back as whiteouts when no file entry is
/// recorded.
pub fn read_icb(
    store: &dyn ByteStore,
    udf: &UdfVolumeInfo,
    location: LongAd,
    deleted: bool,
) -> Result<UdfObject> {
    let mut out = Collector::default();
    if !(deleted && location.extent_length() == 0) {
        let mut ctx = IcbContext::default();
        process(store, udf, location, &mut ctx, &mut out)?;
    }

    if out.entries == 0 {
        if !deleted {
            return Err(IsoFsError::NoDirectIcbEntries);
        }
        let info = ObjectInfo {
            mode: mode::S_IFWHT,
            ..ObjectInfo::default()
        };
        return Ok(UdfObject {
            info,
            extents: ExtentList::single(Extent::hole(0)),
            whiteout: true,
        });
    }

    Ok(UdfObject {
        info: out.info,
        extents: out.extents,
        whiteout: false,
    })
}

fn process(
    store: &dyn ByteStore,
    udf: &UdfVolumeInfo,
    mut location: LongAd,
    ctx: &mut IcbContext,
    out: &mut Collector,
) -> Result<()> {
    let block_size = udf.block_size as usize;

    'icb: loop {
        let length = location.extent_length();
        if length < MIN_ICB_SIZE {
            return Err(IsoFsError::IcbTooSmall { length });
        }
        if length > MAX_ICB_SIZE {
            return Err(IsoFsError::IcbTooBig { length });
        }

        let blocks = (length as usize).div_ceil(block_size);
        let mut buf = vec![0u8; block_size];

        for i in 0..blocks {
            let block = location.block.wrapping_add(i as u32);
            let wanted = (length as usize - i * block_size).min(block_size);
            buf[wanted..].fill(0);
            udf.read(store, location.partition, block, 0, &mut buf[..wanted])?;

            let offset = udf.partition_offset(location.partition, block)?;
            let tag = validate(&buf, None, Some(block), offset)?;
            trace!("udf: ICB block {} tag {:#x}", block, tag.id);

            match tag.id {
                tag::TAG_FILE_ENTRY | tag::TAG_EXTENDED_FILE_ENTRY => {
                    let extended = tag.id == tag::TAG_EXTENDED_FILE_ENTRY;
                    let (info, extents) = parse_file_entry(
                        store,
                        udf,
                        &buf,
                        wanted,
                        extended,
                        location.partition,
                        offset,
                    )?;
                    out.info = info;
                    out.extents = extents;
                    out.entries += 1;
                }
                tag::TAG_INDIRECT_ENTRY => {
                    ctx.indirections += 1;
                    if ctx.indirections > MAX_INDIRECTIONS {
                        return Err(IsoFsError::TooManyIndirections);
                    }
                    let next = LongAd::parse(&buf[0x24..]);
                    if i + 1 == blocks {
                        location = next;
                        continue 'icb;
                    }
                    if ctx.depth + 1 > MAX_ICB_DEPTH {
                        return Err(IsoFsError::IcbTooDeep);
                    }
                    ctx.depth += 1;
                    process(store, udf, next, ctx, out)?;
                    ctx.depth -= 1;
                }
                tag::TAG_TERMINAL_ENTRY => return Ok(()),
                tag::TAG_UNALLOCATED_SPACE_ENTRY => {}
                other => return Err(IsoFsError::UnsupportedIcbType { tag: other }),
            }
        }
        return Ok(());
    }
}

/// Translate a UDF file type into POSIX type bits
fn file_type_mode(file_type: u8) -> Result<u32> {
    match file_type {
        FILE_TYPE_DIRECTORY => Ok(mode::S_IFDIR),
        FILE_TYPE_REGULAR => Ok(mode::S_IFREG),
        FILE_TYPE_BLOCK_DEVICE => Ok(mode::S_IFBLK),
        FILE_TYPE_CHAR_DEVICE => Ok(mode::S_IFCHR),
        FILE_TYPE_FIFO => Ok(mode::S_IFIFO),
        FILE_TYPE_SOCKET => Ok(mode::S_IFSOCK),
        FILE_TYPE_SYMLINK => Ok(mode::S_IFLNK),
        1 | 2 | 3 | 8 | 11 | 13 | 0xf8..=0xfc => {
            Err(IsoFsError::UnsupportedFileType { file_type })
        }
        _ => Err(IsoFsError::UnknownFileType { file_type }),
    }
}

/// Translate UDF permissions plus ICB flags into POSIX permission bits
pub fn permission_mode(permissions: u32, icb_flags: u16) -> u32 {
    let mut bits = 0;
    // other: 0x1/0x2/0x4, group: 0x20/0x40/0x80, owner: 0x400/0x800/0x1000
    for (shift, posix_shift) in [(0, 0), (5, 3), (10, 6)] {
        bits |= ((permissions >> shift) & 0x7) << posix_shift;
    }
    if icb_flags & ICB_FLAG_SETUID != 0 {
        bits |= mode::S_ISUID;
    }
    if icb_flags & ICB_FLAG_SETGID != 0 {
        bits |= mode::S_ISGID;
    }
    if icb_flags & ICB_FLAG_STICKY != 0 {
        bits |= mode::S_ISVTX;
    }
    bits
}

fn timestamp(buf: &[u8], off: usize) -> Timestamp {
    let mut raw = [0u8; 12];
    raw.copy_from_slice(&buf[off..off + 12]);
    let ts = UdfTimestamp::from_bytes(&raw);
    if ts.is_valid() {
        ts.to_timestamp()
    } else {
        Timestamp::EPOCH
    }
}

/// Field offsets that differ between File Entry and Extended File Entry
struct EntryLayout {
    recorded_blocks: usize,
    access: usize,
    modify: usize,
    birth: Option<usize>,
    attribute: usize,
    unique_id: usize,
    ea_length: usize,
    ad_length: usize,
    data: usize,
}

const FILE_ENTRY: EntryLayout = EntryLayout {
    recorded_blocks: 0x40,
    access: 0x48,
    modify: 0x54,
    birth: None,
    attribute: 0x60,
    unique_id: 0xa0,
    ea_length: 0xa8,
    ad_length: 0xac,
    data: 0xb0,
};

const EXTENDED_FILE_ENTRY: EntryLayout = EntryLayout {
    recorded_blocks: 0x48,
    access: 0x50,
    modify: 0x5c,
    birth: Some(0x68),
    attribute: 0x74,
    unique_id: 0xc8,
    ea_length: 0xd0,
    ad_length: 0xd4,
    data: 0xd8,
};

/// Decode a File Entry or Extended File Entry held in `buf`, of which only
/// the first `recorded` bytes belong to the ICB
#[allow(clippy::too_many_arguments)]
fn parse_file_entry(
    store: &dyn ByteStore,
    udf: &UdfVolumeInfo,
    buf: &[u8],
    recorded: usize,
    extended: bool,
    partition: u16,
    offset: u64,
) -> Result<(ObjectInfo, ExtentList)> {
    let layout = if extended {
        &EXTENDED_FILE_ENTRY
    } else {
        &FILE_ENTRY
    };

    let file_type = buf[0x1b];
    let icb_flags = le16(buf, 0x22);
    let type_bits = file_type_mode(file_type)?;

    let size = le64(buf, 0x38);
    let allocated = le64(buf, layout.recorded_blocks)
        .checked_mul(udf.block_size as u64)
        .ok_or(IsoFsError::InvalidAllocation {
            reason: "recorded block count overflows",
        })?;
    let attribute = timestamp(buf, layout.attribute);
    let info = ObjectInfo {
        size,
        allocated,
        access: timestamp(buf, layout.access),
        modify: timestamp(buf, layout.modify),
        change: attribute,
        birth: layout.birth.map_or(attribute, |off| timestamp(buf, off)),
        mode: type_bits | permission_mode(le32(buf, 0x2c), icb_flags),
        inode: le64(buf, layout.unique_id),
        uid: le32(buf, 0x24),
        gid: le32(buf, 0x28),
        links: le16(buf, 0x30) as u32,
        ..ObjectInfo::default()
    };

    let ea_length = le32(buf, layout.ea_length) as usize;
    let ad_length = le32(buf, layout.ad_length) as usize;
    let start = layout.data.checked_add(ea_length);
    let end = start.and_then(|s| s.checked_add(ad_length));
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e <= buf.len() => (s, e),
        _ => {
            return Err(IsoFsError::InvalidAllocation {
                reason: "allocation descriptors exceed the ICB",
            })
        }
    };

    let form = AdForm::from_icb_flags(icb_flags).ok_or(IsoFsError::InvalidAllocation {
        reason: "reserved allocation descriptor form",
    })?;
    let mut extents = if form == AdForm::Embedded {
        // Bytes past the recorded ICB length are not file data
        let embedded = end.min(recorded).saturating_sub(start);
        ExtentList::single(
            Extent::new(offset + start as u64, embedded as u64).in_partition(partition as u32),
        )
    } else {
        decode_allocation(store, udf, form, &buf[start..end], partition)?
    };
    extents.fit_to(size)?;
    Ok((info, extents))
}

/// Decode an allocation descriptor area, following Allocation Extent
/// Descriptors where a descriptor of kind [`AdKind::Next`] says so
pub fn decode_allocation(
    store: &dyn ByteStore,
    udf: &UdfVolumeInfo,
    form: AdForm,
    area: &[u8],
    partition: u16,
) -> Result<ExtentList> {
    let size = form.size();
    let mut extents = ExtentList::new();
    let mut current: Vec<u8> = Vec::new();
    current.try_reserve_exact(area.len())?;
    current.extend_from_slice(area);
    let mut pos = 0usize;
    let mut continuations = 0u32;

    while pos + size <= current.len() {
        let ad = form.decode(&current[pos..], partition);
        pos += size;
        if ad.length == 0 {
            break;
        }
        match ad.kind {
            AdKind::Recorded => {
                let offset = udf.partition_offset(ad.partition, ad.block)?;
                extents.push(
                    Extent::new(offset, ad.length as u64).in_partition(ad.partition as u32),
                )?;
            }
            AdKind::AllocatedOnly | AdKind::Free => {
                extents.push(Extent::hole(ad.length as u64).in_partition(ad.partition as u32))?;
            }
            AdKind::Next => {
                continuations += 1;
                if continuations > MAX_AD_CONTINUATIONS {
                    return Err(IsoFsError::InvalidAllocation {
                        reason: "too many allocation extent descriptors",
                    });
                }
                current = read_allocation_extent(store, udf, ad.partition, ad.block, ad.length)?;
                pos = 0;
            }
        }
    }

    if extents.is_empty() {
        extents.push(Extent::hole(0))?;
    }
    Ok(extents)
}

fn read_allocation_extent(
    store: &dyn ByteStore,
    udf: &UdfVolumeInfo,
    partition: u16,
    block: u32,
    length: u32,
) -> Result<Vec<u8>> {
    let length = (length as usize).min(udf.block_size as usize);
    let mut buf = vec![0u8; udf.block_size as usize];
    udf.read(store, partition, block, 0, &mut buf[..length])?;
    let offset = udf.partition_offset(partition, block)?;
    validate(&buf, Some(tag::TAG_ALLOCATION_EXTENT), Some(block), offset)?;

    let ad_length = le32(&buf, 0x14) as usize;
    let area = buf
        .get(0x18..0x18 + ad_length)
        .ok_or(IsoFsError::InvalidAllocation {
            reason: "allocation extent descriptor overflows its block",
        })?;
    trace!("udf: allocation extent at block {} ({} bytes)", block, ad_length);
    let mut out = Vec::new();
    out.try_reserve_exact(area.len())?;
    out.extend_from_slice(area);
    Ok(out)
}

/// Decode the path component records of a UDF symbolic link
pub fn decode_symlink(data: &[u8]) -> Result<String> {
    let mut target = String::new();
    let mut pos = 0usize;
    while pos + 4 <= data.len() {
        let kind = data[pos];
        let len = data[pos + 1] as usize;
        let ident = data
            .get(pos + 4..pos + 4 + len)
            .ok_or(IsoFsError::InvalidAllocation {
                reason: "symlink component overflows its data",
            })?;
        pos += 4 + len;

        let component = match kind {
            1 | 2 => {
                target.clear();
                target.push('/');
                continue;
            }
            3 => String::from(".."),
            4 => String::from("."),
            5 => decode_osta_cs0(ident),
            other => {
                warn!("udf: skipping symlink component type {}", other);
                continue;
            }
        };
        if !target.is_empty() && !target.ends_with('/') {
            target.push('/');
        }
        target.push_str(&component);
    }
    Ok(target)
}
