//! Volume descriptor sequence scan
//!
//! One pass over the 2048-byte records from sector 16 covers both the
//! ISO 9660 descriptor set (`CD001`) and the UDF volume recognition
//! sequence (`BEA01`, `NSR02`/`NSR03`, `BOOT2`, `TEA01`).

use alloc::vec;

use tracing::{debug, trace, warn};

use super::primary::{self, PrimaryVolumeDescriptor, RootDirectory, STANDARD_ID};
use super::supplementary;
use crate::error::{IsoFsError, Result};
use crate::store::ByteStore;
use crate::types::{MountOptions, MAX_VOLUME_DESCRIPTORS, SECTOR_SIZE, VOLUME_DESCRIPTOR_START};

const TYPE_BOOT_RECORD: u8 = 0;
const TYPE_PRIMARY: u8 = 1;
const TYPE_SUPPLEMENTARY: u8 = 2;
const TYPE_PARTITION: u8 = 3;
const TYPE_TERMINATOR: u8 = 255;

/// An ISO 9660 directory tree described by a volume descriptor
#[derive(Debug, Clone)]
pub struct IsoTree {
    /// The descriptor itself
    pub descriptor: PrimaryVolumeDescriptor,
    /// Root directory location
    pub root: RootDirectory,
    /// Logical block size
    pub block_size: u32,
    /// Volume space size in blocks
    pub volume_space_size: u32,
    /// Volume set size
    pub volume_set_size: u16,
    /// Volume sequence number
    pub volume_sequence: u16,
}

impl IsoTree {
    fn from_descriptor(descriptor: PrimaryVolumeDescriptor) -> Result<Self> {
        Ok(Self {
            block_size: descriptor.block_size()?,
            volume_space_size: descriptor.space_size()?,
            volume_set_size: descriptor.set_size()?,
            volume_sequence: descriptor.sequence_number()?,
            root: descriptor.root()?,
            descriptor,
        })
    }
}

/// What the descriptor scan found
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    /// Primary tree
    pub primary: Option<IsoTree>,
    /// Joliet tree and its level
    pub joliet: Option<(IsoTree, u8)>,
    /// UDF NSR level (2 or 3)
    pub udf_level: Option<u8>,
    /// Boot records seen (El Torito and UDF `BOOT2`)
    pub boot_records: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Iso,
    IsoDone,
    ExtendedArea,
    Nsr,
    Terminated,
}

/// Walk the volume descriptors starting at sector 16
pub fn scan(store: &dyn ByteStore, options: &MountOptions) -> Result<DescriptorSet> {
    let mut set = DescriptorSet::default();
    let mut state = ScanState::Start;
    let mut primaries = 0u32;
    let mut buf = vec![0u8; SECTOR_SIZE];
    let mut index = 0u32;

    loop {
        if index >= MAX_VOLUME_DESCRIPTORS {
            return Err(IsoFsError::TooManyVolumeDescriptors);
        }
        let offset = (VOLUME_DESCRIPTOR_START + index as u64) * SECTOR_SIZE as u64;
        if offset + SECTOR_SIZE as u64 > store.size() {
            if index == 0 {
                return Err(IsoFsError::NotIsoImage);
            }
            break;
        }
        store.read_at(offset, &mut buf)?;
        index += 1;

        let id = &buf[1..6];
        if id == STANDARD_ID {
            match state {
                ScanState::Start | ScanState::Iso => state = ScanState::Iso,
                _ => {
                    trace!("iso9660: ignoring descriptor type {} after terminator", buf[0]);
                    continue;
                }
            }
            match buf[0] {
                TYPE_BOOT_RECORD => set.boot_records += 1,
                TYPE_PRIMARY => {
                    primaries += 1;
                    match primaries {
                        1 => {
                            let pvd = primary::parse(&buf, offset)?;
                            set.primary = Some(IsoTree::from_descriptor(pvd)?);
                        }
                        2 if !options.strict_primary => {
                            warn!("iso9660: ignoring second primary volume descriptor at {}", offset);
                        }
                        _ => {
                            return Err(IsoFsError::InvalidDescriptor {
                                offset,
                                reason: "too many primary volume descriptors",
                            });
                        }
                    }
                }
                TYPE_SUPPLEMENTARY => {
                    if options.joliet_enabled() {
                        supplementary_descriptor(&buf, offset, &mut set);
                    }
                }
                TYPE_PARTITION => {}
                TYPE_TERMINATOR => {
                    if set.primary.is_none() {
                        return Err(IsoFsError::BogusFormat {
                            reason: "no primary volume descriptor before terminator",
                        });
                    }
                    state = ScanState::IsoDone;
                }
                other => {
                    trace!("iso9660: skipping descriptor type {}", other);
                }
            }
            continue;
        }

        let out_of_order = IsoFsError::BogusFormat {
            reason: "volume recognition sequence out of order",
        };
        match id {
            b"BEA01" => match state {
                ScanState::Start | ScanState::IsoDone => state = ScanState::ExtendedArea,
                _ => return Err(out_of_order),
            },
            b"NSR02" | b"NSR03" => match state {
                ScanState::ExtendedArea => {
                    let level = if id == b"NSR02" { 2 } else { 3 };
                    debug!("udf: NSR0{} descriptor at {}", level, offset);
                    set.udf_level = Some(level);
                    state = ScanState::Nsr;
                }
                _ => return Err(out_of_order),
            },
            b"BOOT2" => match state {
                ScanState::ExtendedArea | ScanState::Nsr => set.boot_records += 1,
                _ => return Err(out_of_order),
            },
            b"TEA01" => match state {
                ScanState::ExtendedArea | ScanState::Nsr => {
                    state = ScanState::Terminated;
                    break;
                }
                _ => return Err(out_of_order),
            },
            _ => {
                if index == 1 {
                    return Err(IsoFsError::NotIsoImage);
                }
                trace!("volume descriptor scan stops at {}", offset);
                break;
            }
        }
    }

    match state {
        ScanState::Start => Err(IsoFsError::NotIsoImage),
        ScanState::Iso => Err(IsoFsError::BogusFormat {
            reason: "missing volume descriptor set terminator",
        }),
        ScanState::ExtendedArea | ScanState::Nsr => Err(IsoFsError::BogusFormat {
            reason: "missing terminating extended area descriptor",
        }),
        ScanState::IsoDone | ScanState::Terminated => {
            if set.primary.is_none() && set.udf_level.is_none() {
                return Err(IsoFsError::NotIsoImage);
            }
            Ok(set)
        }
    }
}

/// Accept a supplementary descriptor as the Joliet tree, or explain why not
fn supplementary_descriptor(buf: &[u8], offset: u64, set: &mut DescriptorSet) {
    let svd = match primary::parse(buf, offset) {
        Ok(svd) => svd,
        Err(e) => {
            warn!("iso9660: unusable supplementary descriptor at {}: {}", offset, e);
            return;
        }
    };
    let Some(level) = supplementary::joliet_level(&svd.escape_sequences) else {
        trace!("iso9660: supplementary descriptor at {} is not Joliet", offset);
        return;
    };
    if set.joliet.is_some() {
        warn!("iso9660: ignoring additional Joliet descriptor at {}", offset);
        return;
    }
    let Some(primary) = set.primary.as_ref() else {
        warn!("iso9660: Joliet descriptor at {} precedes the primary", offset);
        return;
    };

    let accepted = supplementary::check_against_primary(&svd, &primary.descriptor)
        .and_then(|()| IsoTree::from_descriptor(svd));
    match accepted {
        Ok(tree) => {
            debug!("iso9660: Joliet level {} descriptor at {}", level, offset);
            set.joliet = Some((tree, level));
        }
        Err(e) => warn!("iso9660: rejecting Joliet descriptor at {}: {}", offset, e),
    }
}
