//! Rock Ridge extension support
//!
//! Rock Ridge adds POSIX filesystem semantics (permissions, symlinks, long
//! names) through SUSP entries stored after a directory record's name. An
//! entry list may continue in another sector (`CE`); that sector is read
//! through a one-sector cache owned by the volume and guarded by its lock.

use alloc::boxed::Box;
use alloc::vec::Vec;

use tracing::{trace, warn};

use crate::directory::record::DirectoryRecord;
use crate::store::ByteStore;
use crate::types::{mode, ObjectInfo, MAX_NAME_LENGTH, SECTOR_SIZE};
use crate::utils::datetime::{DateTime17, DateTime7, Timestamp};
use crate::utils::{le32, le64};

/// Signature constants
pub mod signatures {
    /// Continuation area
    pub const CONTINUATION: [u8; 2] = *b"CE";
    /// SUSP indicator
    pub const SUSP_INDICATOR: [u8; 2] = *b"SP";
    /// Extensions reference
    pub const EXTENSIONS: [u8; 2] = *b"ER";
    /// Rock Ridge indicator (RRIP 1.09)
    pub const ROCK_RIDGE: [u8; 2] = *b"RR";
    /// POSIX file attributes signature
    pub const POSIX_ATTRS: [u8; 2] = *b"PX";
    /// POSIX device number signature
    pub const POSIX_DEV: [u8; 2] = *b"PN";
    /// Symbolic link signature
    pub const SYMLINK: [u8; 2] = *b"SL";
    /// Alternate name signature
    pub const ALTERNATE_NAME: [u8; 2] = *b"NM";
    /// Timestamps signature
    pub const TIMESTAMPS: [u8; 2] = *b"TF";
    /// Terminator
    pub const TERMINATOR: [u8; 2] = *b"ST";
    /// Padding
    pub const PADDING: [u8; 2] = *b"PD";
}

/// Extension identifiers announcing Rock Ridge in an `ER` entry
const EXTENSION_IDS: [&[u8]; 3] = [b"RRIP_1991A", b"IEEE_P1282", b"IEEE_1282"];

const NM_CONTINUE: u8 = 0x01;
const NM_CURRENT: u8 = 0x02;
const NM_PARENT: u8 = 0x04;

const SL_CONTINUE: u8 = 0x01;
const SL_CURRENT: u8 = 0x02;
const SL_PARENT: u8 = 0x04;
const SL_ROOT: u8 = 0x08;

/// Most recently read continuation sector
#[derive(Debug)]
pub struct CachedSector {
    /// Absolute byte offset of `data`
    pub offset: u64,
    /// Sector contents
    pub data: [u8; SECTOR_SIZE],
}

/// Lock-protected single-sector cache for continuation areas
pub type ScratchSector = spin::Mutex<Option<Box<CachedSector>>>;

/// Timestamps from a `TF` entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RockRidgeTimes {
    /// Creation
    pub birth: Option<Timestamp>,
    /// Modification
    pub modify: Option<Timestamp>,
    /// Last access
    pub access: Option<Timestamp>,
    /// Attribute change
    pub change: Option<Timestamp>,
}

/// POSIX attributes from a `PX` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
    /// File mode
    pub mode: u32,
    /// Link count
    pub links: u32,
    /// Owner
    pub uid: u32,
    /// Group
    pub gid: u32,
    /// Serial number (RRIP 1.12 only)
    pub inode: Option<u32>,
}

/// Everything gathered from the System Use entries of one record
#[derive(Debug, Default)]
pub struct RockRidgeInfo {
    /// Alternate name (`NM`), accumulated across continuations
    pub name: Vec<u8>,
    /// An `NM` entry was seen
    pub has_name: bool,
    /// Symlink target (`SL`)
    pub symlink: Vec<u8>,
    /// An `SL` entry was seen
    pub has_symlink: bool,
    /// The `NM` name hit the length cap and is incomplete
    pub name_overflow: bool,
    /// The `SL` target hit the length cap and is incomplete
    pub symlink_overflow: bool,
    /// `PX` attributes
    pub posix: Option<PosixAttributes>,
    /// `PN` device number
    pub device: Option<u64>,
    /// `TF` timestamps
    pub times: RockRidgeTimes,
    /// `SP` skip length, if an `SP` entry was found
    pub susp_skip: Option<u8>,
    /// `ER` (or `RR`) announced Rock Ridge
    pub extension: bool,
    /// Recognised entries
    pub recognized: u32,
    name_done: bool,
    symlink_done: bool,
    symlink_separator: bool,
}

impl RockRidgeInfo {
    /// Rock Ridge data is only trusted with more than one recognised entry
    pub fn is_valid(&self) -> bool {
        self.recognized > 1
    }

    /// Complete alternate name, if one was recorded
    pub fn alternate_name(&self) -> Option<&[u8]> {
        (self.has_name && !self.name_overflow && !self.name.is_empty())
            .then_some(self.name.as_slice())
    }

    /// Overlay the POSIX view onto `info`.
    ///
    /// `PX` may not turn a directory into a non-directory or the other way
    /// round; such a type change is dropped and only the permissions kept.
    pub fn apply(&self, info: &mut ObjectInfo) {
        if let Some(px) = self.posix {
            let was_dir = info.is_directory();
            let is_dir = px.mode & mode::S_IFMT == mode::S_IFDIR;
            if was_dir != is_dir {
                warn!(
                    "rock ridge: PX mode {:o} disagrees with record type, keeping type",
                    px.mode
                );
                info.mode = (info.mode & mode::S_IFMT) | (px.mode & mode::PERM_MASK);
            } else {
                info.mode = px.mode;
            }
            info.links = px.links;
            info.uid = px.uid;
            info.gid = px.gid;
            if let Some(inode) = px.inode.filter(|&ino| ino != 0) {
                info.inode = inode as u64;
            }
        }
        if let Some(device) = self.device {
            info.device = device;
        }
        let t = &self.times;
        info.birth = t.birth.unwrap_or(info.birth);
        info.modify = t.modify.unwrap_or(info.modify);
        info.access = t.access.unwrap_or(info.access);
        info.change = t.change.unwrap_or(info.change);
    }

    fn append_capped(target: &mut Vec<u8>, bytes: &[u8], overflow: &mut bool) {
        if *overflow {
            return;
        }
        if target.len() + bytes.len() > MAX_NAME_LENGTH
            || target.try_reserve(bytes.len()).is_err()
        {
            *overflow = true;
            return;
        }
        target.extend_from_slice(bytes);
    }

    fn add_name(&mut self, entry: &[u8]) {
        if self.name_done {
            return;
        }
        let flags = entry[4];
        self.has_name = true;
        if flags & (NM_CURRENT | NM_PARENT) == 0 {
            Self::append_capped(&mut self.name, &entry[5..], &mut self.name_overflow);
        }
        if flags & NM_CONTINUE == 0 {
            self.name_done = true;
        }
    }

    fn add_symlink(&mut self, entry: &[u8]) {
        if self.symlink_done {
            return;
        }
        self.has_symlink = true;
        let flags = entry[4];
        let mut pos = 5usize;
        while pos + 2 <= entry.len() {
            let cflags = entry[pos];
            let len = entry[pos + 1] as usize;
            let Some(content) = entry.get(pos + 2..pos + 2 + len) else {
                warn!("rock ridge: SL component overflows its entry");
                break;
            };
            pos += 2 + len;

            if self.symlink_separator {
                Self::append_capped(&mut self.symlink, b"/", &mut self.symlink_overflow);
            }
            let part: &[u8] = if cflags & SL_ROOT != 0 {
                b"/"
            } else if cflags & SL_PARENT != 0 {
                b".."
            } else if cflags & SL_CURRENT != 0 {
                b"."
            } else {
                content
            };
            Self::append_capped(&mut self.symlink, part, &mut self.symlink_overflow);
            self.symlink_separator = cflags & (SL_ROOT | SL_CONTINUE) == 0;
        }
        if flags & SL_CONTINUE == 0 {
            self.symlink_done = true;
        }
    }
}

fn parse_time(entry: &[u8], pos: usize, long: bool) -> Option<Timestamp> {
    if long {
        let raw: &[u8; 17] = entry.get(pos..pos + 17)?.try_into().ok()?;
        let dt = DateTime17::from_bytes(raw)?;
        dt.is_valid().then(|| dt.to_timestamp())
    } else {
        let raw: &[u8; 7] = entry.get(pos..pos + 7)?.try_into().ok()?;
        let dt = DateTime7::from_bytes(raw);
        dt.is_valid().then(|| dt.to_timestamp())
    }
}

/// Continuation area requested by a `CE` entry
#[derive(Debug, Clone, Copy)]
struct Continuation {
    block: u32,
    offset: u32,
    length: u32,
}

/// Walks SUSP entries for one volume
pub struct SuspScanner<'a> {
    store: &'a dyn ByteStore,
    scratch: &'a ScratchSector,
    block_size: u64,
    skip: usize,
}

impl<'a> SuspScanner<'a> {
    /// Scanner for a volume with logical blocks of `block_size` bytes,
    /// skipping `skip` bytes at the start of every System Use area
    pub fn new(
        store: &'a dyn ByteStore,
        scratch: &'a ScratchSector,
        block_size: u64,
        skip: usize,
    ) -> Self {
        Self {
            store,
            scratch,
            block_size,
            skip,
        }
    }

    /// Gather the Rock Ridge data of `record`
    pub fn scan(&self, record: &DirectoryRecord<'_>) -> RockRidgeInfo {
        let mut info = RockRidgeInfo::default();
        let area = record.system_use();
        if self.skip > area.len() {
            return info;
        }
        let special = record.is_self() || record.is_parent();
        if let Some(ce) = parse_area(&area[self.skip..], special, &mut info) {
            self.follow(ce, special, &mut info);
        }
        trace!(
            "rock ridge: record at {} has {} entries",
            record.offset(),
            info.recognized
        );
        info
    }

    fn follow(&self, ce: Continuation, special: bool, info: &mut RockRidgeInfo) {
        let start = ce.block as u64 * self.block_size + ce.offset as u64;
        let sector = start - start % SECTOR_SIZE as u64;
        let within = (start - sector) as usize;
        let end = within + ce.length as usize;
        if end > SECTOR_SIZE {
            warn!("rock ridge: continuation area at {} crosses a sector, ignored", start);
            return;
        }

        let mut cache = self.scratch.lock();
        if cache.as_ref().map(|c| c.offset) != Some(sector) {
            let mut fresh = cache.take().unwrap_or_else(|| {
                Box::new(CachedSector {
                    offset: 0,
                    data: [0u8; SECTOR_SIZE],
                })
            });
            if let Err(e) = self.store.read_at(sector, &mut fresh.data) {
                warn!("rock ridge: continuation area unreadable: {}", e);
                return;
            }
            fresh.offset = sector;
            *cache = Some(fresh);
        }
        if let Some(cached) = cache.as_ref() {
            if parse_area(&cached.data[within..end], special, info).is_some() {
                warn!("rock ridge: nested continuation at {} ignored", start);
            }
        }
    }
}

/// Decode one System Use area. Returns the continuation it asks for.
fn parse_area(area: &[u8], special: bool, info: &mut RockRidgeInfo) -> Option<Continuation> {
    let mut continuation = None;
    let mut pos = 0usize;

    while pos + 4 <= area.len() {
        let sig = [area[pos], area[pos + 1]];
        let len = area[pos + 2] as usize;
        if len < 4 || pos + len > area.len() {
            warn!("rock ridge: bad entry length {} at {}", len, pos);
            break;
        }
        let entry = &area[pos..pos + len];
        pos += len;

        match sig {
            signatures::CONTINUATION if len >= 28 => {
                continuation = Some(Continuation {
                    block: le32(entry, 4),
                    offset: le32(entry, 12),
                    length: le32(entry, 20),
                });
                info.recognized += 1;
            }
            signatures::SUSP_INDICATOR if len >= 7 && entry[4] == 0xBE && entry[5] == 0xEF => {
                info.susp_skip = Some(entry[6]);
                info.recognized += 1;
            }
            signatures::EXTENSIONS if len >= 8 => {
                let id_len = entry[4] as usize;
                if let Some(id) = entry.get(8..8 + id_len) {
                    if EXTENSION_IDS.contains(&id) {
                        info.extension = true;
                    }
                }
                info.recognized += 1;
            }
            signatures::ROCK_RIDGE => {
                info.extension = true;
                info.recognized += 1;
            }
            signatures::POSIX_ATTRS if len >= 36 => {
                info.posix = Some(PosixAttributes {
                    mode: le32(entry, 4),
                    links: le32(entry, 12),
                    uid: le32(entry, 20),
                    gid: le32(entry, 28),
                    inode: (len >= 44).then(|| le32(entry, 36)),
                });
                info.recognized += 1;
            }
            signatures::POSIX_DEV if len >= 20 => {
                let high = le32(entry, 4) as u64;
                let low = le32(entry, 12) as u64;
                info.device = Some(high << 32 | low);
                info.recognized += 1;
            }
            signatures::TIMESTAMPS if len >= 5 => {
                let flags = entry[4];
                let long = flags & 0x80 != 0;
                let width = if long { 17 } else { 7 };
                let mut at = 5usize;
                let slots = [
                    &mut info.times.birth,
                    &mut info.times.modify,
                    &mut info.times.access,
                    &mut info.times.change,
                ];
                for (bit, slot) in slots.into_iter().enumerate() {
                    if flags & (1 << bit) != 0 {
                        *slot = parse_time(entry, at, long);
                        at += width;
                    }
                }
                info.recognized += 1;
            }
            signatures::SYMLINK if len >= 5 => {
                info.add_symlink(entry);
                info.recognized += 1;
            }
            signatures::ALTERNATE_NAME if len >= 5 => {
                if !special {
                    info.add_name(entry);
                }
                info.recognized += 1;
            }
            signatures::TERMINATOR => break,
            signatures::PADDING => {}
            _ => trace!("rock ridge: skipping {:?} entry", core::str::from_utf8(&sig)),
        }
    }

    continuation
}

/// Check the `.` record of the root directory for Rock Ridge
///
/// Returns the SUSP skip length when an `SP` entry and a Rock Ridge
/// extension announcement are found.
pub fn detect(
    store: &dyn ByteStore,
    scratch: &ScratchSector,
    block_size: u64,
    root_self: &DirectoryRecord<'_>,
) -> Option<usize> {
    let info = SuspScanner::new(store, scratch, block_size, 0).scan(root_self);
    match info.susp_skip {
        Some(skip) if info.extension => Some(skip as usize),
        _ => None,
    }
}
