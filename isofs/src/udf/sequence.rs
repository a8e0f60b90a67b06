//! UDF volume descriptor sequence discovery
//!
//! Runs once the volume recognition sequence reported an NSR descriptor:
//! finds an Anchor Volume Descriptor Pointer, walks the main (or reserve)
//! Volume Descriptor Sequence it references, keeps the prevailing copy of
//! each descriptor and resolves the logical volume into partition maps.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use tracing::{debug, trace, warn};

use super::ad::LongAd;
use super::tag::{self, validate};
use super::{PartitionMapKind, UdfPartitionMap, UdfVolumeInfo, UDF_SECTOR_SIZE};
use crate::error::{IsoFsError, Result};
use crate::store::ByteStore;
use crate::utils::string::{decode_ascii, decode_dstring};
use crate::utils::{le16, le32};

/// Sector of the first anchor pointer
const ANCHOR_SECTOR: u64 = 256;

/// Largest descriptor sequence extent we read
const MAX_SEQUENCE_LENGTH: u32 = 64 * 1024;

/// Nesting limit for Volume Descriptor Pointers
const MAX_SEQUENCE_DEPTH: u32 = 5;

/// Upper bound on partition maps in one logical volume
const MAX_PARTITION_MAPS: u32 = 64;

const OSTA_CHARSET: &[u8] = b"OSTA Compressed Unicode";

#[derive(Debug, Clone)]
struct PrimaryVolume {
    sequence: u32,
    identifier: [u8; 32],
}

#[derive(Debug, Clone)]
struct LogicalVolume {
    sequence: u32,
    charset: [u8; 64],
    identifier: [u8; 128],
    block_size: u32,
    file_set: LongAd,
    map_table_length: u32,
    map_count: u32,
    maps: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Partition {
    sequence: u32,
    number: u16,
    access_type: u32,
    start: u32,
    length: u32,
}

/// Descriptors collected while walking one sequence
#[derive(Debug, Default)]
struct Gathered {
    primaries: Vec<PrimaryVolume>,
    logicals: Vec<LogicalVolume>,
    partitions: Vec<Partition>,
    implementation_id: Option<String>,
}

/// Keep `new` if it prevails over the matching entry of `list`.
/// Equal or higher sequence numbers replace, lower ones are dropped.
fn prevail<T>(
    list: &mut Vec<T>,
    new: T,
    same: impl Fn(&T, &T) -> bool,
    sequence: impl Fn(&T) -> u32,
    what: &'static str,
) -> Result<()> {
    match list.iter_mut().find(|old| same(&**old, &new)) {
        Some(old) if sequence(&new) >= sequence(old) => {
            debug!(
                "udf: {} seq {} replaces seq {}",
                what,
                sequence(&new),
                sequence(old)
            );
            *old = new;
        }
        Some(old) => {
            debug!(
                "udf: discarding {} seq {}, seq {} prevails",
                what,
                sequence(&new),
                sequence(old)
            );
        }
        None => {
            list.try_reserve(1)?;
            list.push(new);
        }
    }
    Ok(())
}

/// Locate and load the UDF volume described on `store`
pub fn load(store: &dyn ByteStore, level: u8) -> Result<UdfVolumeInfo> {
    let sectors = store.size() / UDF_SECTOR_SIZE;
    let mut candidates: Vec<u64> = Vec::new();
    for sector in [ANCHOR_SECTOR, sectors.wrapping_sub(256), sectors.wrapping_sub(1)] {
        if sector >= ANCHOR_SECTOR && sector < sectors && !candidates.contains(&sector) {
            candidates.try_reserve(1)?;
            candidates.push(sector);
        }
    }

    let mut seen: Vec<(u32, u32)> = Vec::new();
    let mut last_error = IsoFsError::NoAnchorPointer;
    let mut anchor = vec![0u8; 512];

    for sector in candidates {
        let offset = sector * UDF_SECTOR_SIZE;
        let anchor_tag = store
            .read_at(offset, &mut anchor)
            .and_then(|()| validate(&anchor, Some(tag::TAG_ANCHOR_POINTER), Some(sector as u32), offset));
        if let Err(e) = anchor_tag {
            debug!("udf: no anchor at sector {}: {}", sector, e);
            continue;
        }

        let main = (le32(&anchor, 0x14), le32(&anchor, 0x10));
        let reserve = (le32(&anchor, 0x1c), le32(&anchor, 0x18));
        for (location, length) in [main, reserve] {
            if length == 0 || seen.contains(&(location, length)) {
                continue;
            }
            seen.try_reserve(1)?;
            seen.push((location, length));

            match load_sequence(store, level, location, length) {
                Ok(info) => return Ok(info),
                Err(e) => {
                    warn!(
                        "udf: descriptor sequence at sector {} ({} bytes) unusable: {}",
                        location, length, e
                    );
                    last_error = e;
                }
            }
        }
    }
    Err(last_error)
}

fn load_sequence(
    store: &dyn ByteStore,
    level: u8,
    location: u32,
    length: u32,
) -> Result<UdfVolumeInfo> {
    let mut gathered = Gathered::default();
    scan_sequence(store, &mut gathered, location, length, 0)?;
    resolve(store, level, gathered)
}

fn scan_sequence(
    store: &dyn ByteStore,
    gathered: &mut Gathered,
    location: u32,
    length: u32,
    depth: u32,
) -> Result<()> {
    if length > MAX_SEQUENCE_LENGTH {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "volume descriptor sequence too long",
        });
    }
    let count = length as usize / UDF_SECTOR_SIZE as usize;
    let mut data = Vec::new();
    data.try_reserve_exact(count * UDF_SECTOR_SIZE as usize)?;
    data.resize(count * UDF_SECTOR_SIZE as usize, 0);
    store.read_at(location as u64 * UDF_SECTOR_SIZE, &mut data)?;

    for (i, desc) in data.chunks_exact(UDF_SECTOR_SIZE as usize).enumerate() {
        let sector = location + i as u32;
        let offset = sector as u64 * UDF_SECTOR_SIZE;
        let tag = validate(desc, None, Some(sector), offset)?;
        trace!("udf: descriptor {:#x} at sector {}", tag.id, sector);

        match tag.id {
            tag::TAG_PRIMARY_VOLUME => {
                let mut identifier = [0u8; 32];
                identifier.copy_from_slice(&desc[0x18..0x38]);
                let pvd = PrimaryVolume {
                    sequence: le32(desc, 0x10),
                    identifier,
                };
                prevail(
                    &mut gathered.primaries,
                    pvd,
                    |a, b| a.identifier == b.identifier,
                    |d| d.sequence,
                    "primary volume descriptor",
                )?;
            }
            tag::TAG_VOLUME_POINTER => {
                if depth + 1 > MAX_SEQUENCE_DEPTH {
                    return Err(IsoFsError::InvalidUdfVolume {
                        reason: "volume descriptor pointers nested too deeply",
                    });
                }
                let next_length = le32(desc, 0x14);
                let next_location = le32(desc, 0x18);
                debug!("udf: following descriptor pointer to sector {}", next_location);
                return scan_sequence(store, gathered, next_location, next_length, depth + 1);
            }
            tag::TAG_IMPLEMENTATION_USE => {
                gathered.implementation_id = Some(decode_ascii(&desc[0x15..0x15 + 23]));
            }
            tag::TAG_PARTITION => {
                let pd = Partition {
                    sequence: le32(desc, 0x10),
                    number: le16(desc, 0x16),
                    access_type: le32(desc, 0xb8),
                    start: le32(desc, 0xbc),
                    length: le32(desc, 0xc0),
                };
                prevail(
                    &mut gathered.partitions,
                    pd,
                    |a, b| a.number == b.number,
                    |d| d.sequence,
                    "partition descriptor",
                )?;
            }
            tag::TAG_LOGICAL_VOLUME => {
                let lvd = parse_logical_volume(desc, offset)?;
                prevail(
                    &mut gathered.logicals,
                    lvd,
                    |a, b| a.identifier == b.identifier,
                    |d| d.sequence,
                    "logical volume descriptor",
                )?;
            }
            tag::TAG_TERMINATING => return Ok(()),
            tag::TAG_UNALLOCATED_SPACE => {}
            other => {
                return Err(IsoFsError::UnexpectedTag { offset, tag: other });
            }
        }
    }
    Ok(())
}

fn parse_logical_volume(desc: &[u8], offset: u64) -> Result<LogicalVolume> {
    let map_table_length = le32(desc, 0x108);
    let end = 0x1b8usize
        .checked_add(map_table_length as usize)
        .filter(|&end| end <= desc.len())
        .ok_or(IsoFsError::InvalidDescriptor {
            offset,
            reason: "partition map table exceeds descriptor",
        })?;
    let mut maps = Vec::new();
    maps.try_reserve_exact(end - 0x1b8)?;
    maps.extend_from_slice(&desc[0x1b8..end]);

    let mut charset = [0u8; 64];
    charset.copy_from_slice(&desc[0x14..0x54]);
    let mut identifier = [0u8; 128];
    identifier.copy_from_slice(&desc[0x54..0xd4]);

    Ok(LogicalVolume {
        sequence: le32(desc, 0x10),
        charset,
        identifier,
        block_size: le32(desc, 0xd4),
        file_set: LongAd::parse(&desc[0xf8..]),
        map_table_length,
        map_count: le32(desc, 0x10c),
        maps,
    })
}

fn resolve(store: &dyn ByteStore, level: u8, gathered: Gathered) -> Result<UdfVolumeInfo> {
    let [pvd] = gathered.primaries.as_slice() else {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "expected exactly one primary volume descriptor",
        });
    };
    let [lvd] = gathered.logicals.as_slice() else {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "expected exactly one logical volume descriptor",
        });
    };

    if lvd.charset[0] != 0 || !lvd.charset[1..].starts_with(OSTA_CHARSET) {
        return Err(IsoFsError::UnsupportedCharset);
    }
    if lvd.block_size as u64 != UDF_SECTOR_SIZE {
        return Err(IsoFsError::InvalidBlockSize {
            size: lvd.block_size,
        });
    }

    let partitions = resolve_partition_maps(lvd, &gathered.partitions)?;

    let mut info = UdfVolumeInfo {
        level,
        volume_id: decode_dstring(&pvd.identifier),
        logical_volume_id: decode_dstring(&lvd.identifier),
        block_size: lvd.block_size,
        implementation_id: gathered.implementation_id,
        partitions,
        root_icb: LongAd::default(),
    };
    info.root_icb = read_file_set(store, &info, lvd.file_set)?;
    debug!(
        "udf: logical volume {:?}, {} partition(s)",
        info.logical_volume_id,
        info.partitions.len()
    );
    Ok(info)
}

fn resolve_partition_maps(
    lvd: &LogicalVolume,
    partitions: &[Partition],
) -> Result<Vec<UdfPartitionMap>> {
    if lvd.map_count > MAX_PARTITION_MAPS {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "too many partition maps",
        });
    }
    let table = &lvd.maps[..lvd.map_table_length as usize];
    let mut maps = Vec::new();
    maps.try_reserve_exact(lvd.map_count as usize)?;

    let mut pos = 0usize;
    for _ in 0..lvd.map_count {
        let entry = table
            .get(pos..pos + 2)
            .and_then(|head| table.get(pos..pos + head[1] as usize))
            .filter(|entry| entry.len() >= 2)
            .ok_or(IsoFsError::InvalidUdfVolume {
                reason: "truncated partition map entry",
            })?;

        match (entry[0], entry.len()) {
            (1, 6) => {
                let number = le16(entry, 4);
                let (index, pd) = partitions
                    .iter()
                    .enumerate()
                    .find(|(_, pd)| pd.number == number)
                    .ok_or(IsoFsError::PartitionNotFound { number })?;
                maps.push(UdfPartitionMap {
                    number,
                    descriptor_index: index,
                    start_sector: pd.start,
                    sector_count: pd.length,
                    start_byte: pd.start as u64 * UDF_SECTOR_SIZE,
                    access_type: pd.access_type,
                    kind: PartitionMapKind::Plain,
                });
            }
            (2, 64) => {
                let identifier = &entry[5..28];
                let kind = if identifier.starts_with(b"*UDF Virtual Partition") {
                    PartitionMapKind::Virtual
                } else if identifier.starts_with(b"*UDF Sparable Partition") {
                    PartitionMapKind::Sparable
                } else if identifier.starts_with(b"*UDF Metadata Partition") {
                    PartitionMapKind::Metadata
                } else {
                    return Err(IsoFsError::InvalidUdfVolume {
                        reason: "unknown type 2 partition map",
                    });
                };
                return Err(IsoFsError::UnsupportedPartitionMap { kind });
            }
            _ => {
                return Err(IsoFsError::InvalidUdfVolume {
                    reason: "unknown partition map type",
                });
            }
        }
        pos += entry.len();
    }

    if maps.is_empty() {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "logical volume has no partitions",
        });
    }
    Ok(maps)
}

/// Read the File Set Descriptor and return the root directory ICB
fn read_file_set(store: &dyn ByteStore, info: &UdfVolumeInfo, location: LongAd) -> Result<LongAd> {
    let mut fsd = vec![0u8; UDF_SECTOR_SIZE as usize];
    info.read(store, location.partition, location.block, 0, &mut fsd)?;
    let offset = info.partition_offset(location.partition, location.block)?;
    validate(&fsd, Some(tag::TAG_FILE_SET), Some(location.block), offset)?;

    let root = LongAd::parse(&fsd[0x190..]);
    if root.extent_length() == 0 {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "file set has no root directory",
        });
    }
    if LongAd::parse(&fsd[0x1c0..]).extent_length() != 0 {
        return Err(IsoFsError::InvalidUdfVolume {
            reason: "chained file set descriptors are not supported",
        });
    }
    Ok(root)
}
