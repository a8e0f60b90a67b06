//! In-memory UDF image builder
//!
//! Layout (2048-byte sectors and logical blocks):
//!
//! - 16..: optional ISO 9660 bridge, then BEA01 / NSR0x / TEA01
//! - 32: main volume descriptor sequence
//! - 48: reserve volume descriptor sequence
//! - 256: anchor volume descriptor pointer
//! - 300..: the partition (FSD at block 0, root ICB at block 1)

use isofs::utils::checksum::{tag_checksum, tag_crc};

use super::builder::{
    ascii_field, descriptor, er, nm, px, record, sp, ucs2, ucs2_field, SECTOR,
};

pub const PARTITION_START: u32 = 300;
const MAIN_VDS: u32 = 32;
const RESERVE_VDS: u32 = 48;
const ANCHOR: u32 = 256;

pub const TAG_PRIMARY_VOLUME: u16 = 1;
pub const TAG_ANCHOR: u16 = 2;
pub const TAG_IMPLEMENTATION_USE: u16 = 4;
pub const TAG_PARTITION: u16 = 5;
pub const TAG_LOGICAL_VOLUME: u16 = 6;
pub const TAG_TERMINATING: u16 = 8;
pub const TAG_FILE_SET: u16 = 256;
pub const TAG_FILE_ID: u16 = 257;
pub const TAG_INDIRECT_ENTRY: u16 = 259;
pub const TAG_TERMINAL_ENTRY: u16 = 260;
pub const TAG_FILE_ENTRY: u16 = 261;
pub const TAG_EXTENDED_FILE_ENTRY: u16 = 266;

const FID_DIRECTORY: u8 = 0x02;
const FID_DELETED: u8 = 0x04;
const FID_PARENT: u8 = 0x08;
const FID_HIDDEN: u8 = 0x01;

const TYPE_DIRECTORY: u8 = 4;
const TYPE_REGULAR: u8 = 5;
const TYPE_SYMLINK: u8 = 12;

/// 2022-03-04 05:06:07 UTC
pub const MODIFY_TIME: [u8; 12] = [0x00, 0x10, 0xE6, 0x07, 3, 4, 5, 6, 7, 0, 0, 0];

/// Write a descriptor tag over `buf[..16]`, CRC over `crc_length` body bytes
pub fn stamp(buf: &mut [u8], id: u16, version: u16, location: u32, crc_length: usize) {
    buf[0..2].copy_from_slice(&id.to_le_bytes());
    buf[2..4].copy_from_slice(&version.to_le_bytes());
    buf[10..12].copy_from_slice(&(crc_length as u16).to_le_bytes());
    buf[12..16].copy_from_slice(&location.to_le_bytes());
    let crc = tag_crc(&buf[16..16 + crc_length]);
    buf[8..10].copy_from_slice(&crc.to_le_bytes());
    buf[4] = 0;
    buf[4] = tag_checksum(&buf[..16]);
}

pub fn long_ad(length: u32, block: u32, partition: u16) -> [u8; 16] {
    let mut ad = [0u8; 16];
    ad[0..4].copy_from_slice(&length.to_le_bytes());
    ad[4..8].copy_from_slice(&block.to_le_bytes());
    ad[8..10].copy_from_slice(&partition.to_le_bytes());
    ad
}

fn short_ad(length: u32, block: u32) -> [u8; 8] {
    let mut ad = [0u8; 8];
    ad[0..4].copy_from_slice(&length.to_le_bytes());
    ad[4..8].copy_from_slice(&block.to_le_bytes());
    ad
}

/// OSTA CS0 with 8-bit units
pub fn cs0(s: &str) -> Vec<u8> {
    let mut out = vec![8u8];
    out.extend_from_slice(s.as_bytes());
    out
}

fn dstring<const N: usize>(s: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let raw = cs0(s);
    field[..raw.len()].copy_from_slice(&raw);
    field[N - 1] = raw.len() as u8;
    field
}

#[derive(Debug, Clone)]
pub enum UdfNode {
    File {
        name: String,
        data: Vec<u8>,
        embedded: bool,
        extended: bool,
        hidden: bool,
    },
    Dir {
        name: String,
        children: Vec<UdfNode>,
    },
    Symlink {
        name: String,
        /// Raw path component records
        components: Vec<u8>,
    },
    /// Deleted identifier with no ICB behind it
    Deleted {
        name: String,
    },
    /// Embedded file reached through `nested` recursively followed indirect
    /// entries, then `chained` indirect entries in last position
    Indirect {
        name: String,
        data: Vec<u8>,
        nested: usize,
        chained: usize,
    },
}

impl UdfNode {
    pub fn file(name: &str, data: &[u8]) -> Self {
        Self::File {
            name: name.to_string(),
            data: data.to_vec(),
            embedded: false,
            extended: false,
            hidden: false,
        }
    }

    pub fn embedded(name: &str, data: &[u8]) -> Self {
        Self::File {
            name: name.to_string(),
            data: data.to_vec(),
            embedded: true,
            extended: false,
            hidden: false,
        }
    }

    pub fn extended(name: &str, data: &[u8]) -> Self {
        Self::File {
            name: name.to_string(),
            data: data.to_vec(),
            embedded: false,
            extended: true,
            hidden: false,
        }
    }

    pub fn hidden(name: &str, data: &[u8]) -> Self {
        Self::File {
            name: name.to_string(),
            data: data.to_vec(),
            embedded: true,
            extended: false,
            hidden: true,
        }
    }

    pub fn dir(name: &str, children: Vec<UdfNode>) -> Self {
        Self::Dir {
            name: name.to_string(),
            children,
        }
    }

    /// Relative symlink made of plain name components
    pub fn symlink(name: &str, target: &[&str]) -> Self {
        let mut components = Vec::new();
        for part in target {
            match *part {
                ".." => components.extend_from_slice(&[3, 0, 0, 0]),
                "." => components.extend_from_slice(&[4, 0, 0, 0]),
                part => {
                    let ident = cs0(part);
                    components.extend_from_slice(&[5, ident.len() as u8, 0, 0]);
                    components.extend_from_slice(&ident);
                }
            }
        }
        Self::Symlink {
            name: name.to_string(),
            components,
        }
    }

    pub fn deleted(name: &str) -> Self {
        Self::Deleted {
            name: name.to_string(),
        }
    }

    pub fn indirect(name: &str, data: &[u8], nested: usize, chained: usize) -> Self {
        Self::Indirect {
            name: name.to_string(),
            data: data.to_vec(),
            nested,
            chained,
        }
    }
}

/// Extra partition descriptor: (sequence number, start sector)
type ExtraPartition = (u32, u32);

pub struct UdfBuilder {
    label: String,
    nsr_level: u8,
    root: Vec<UdfNode>,
    iso_bridge: Option<String>,
    bridge_joliet: Option<String>,
    partition_sequence: u32,
    extra_partitions: Vec<ExtraPartition>,
    corrupt_main: bool,
    anchor_at_end: bool,
    charset: &'static [u8],
    block_size: u32,
    type2_map: Option<&'static [u8]>,
    blocks: Vec<Vec<u8>>,
}

impl UdfBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            nsr_level: 2,
            root: Vec::new(),
            iso_bridge: None,
            bridge_joliet: None,
            partition_sequence: 7,
            extra_partitions: Vec::new(),
            corrupt_main: false,
            anchor_at_end: false,
            charset: b"OSTA Compressed Unicode",
            block_size: SECTOR as u32,
            type2_map: None,
            blocks: Vec::new(),
        }
    }

    pub fn nsr03(mut self) -> Self {
        self.nsr_level = 3;
        self
    }

    pub fn entry(mut self, node: UdfNode) -> Self {
        self.root.push(node);
        self
    }

    /// Also record an ISO 9660 tree holding a single `ISO.TXT`
    pub fn iso_bridge(mut self, label: &str) -> Self {
        self.iso_bridge = Some(label.to_string());
        self
    }

    /// Record an ISO 9660 bridge with Rock Ridge entries and a Joliet tree.
    /// Its one file is `ISO.TXT;1` on the primary tree, named
    /// `Rock Ridge.txt` by Rock Ridge and `Joliet Name.txt` on the Joliet tree.
    pub fn hybrid_bridge(mut self, label: &str, joliet_label: &str) -> Self {
        self.iso_bridge = Some(label.to_string());
        self.bridge_joliet = Some(joliet_label.to_string());
        self
    }

    /// Sequence number of the real partition descriptor
    pub fn partition_sequence(mut self, sequence: u32) -> Self {
        self.partition_sequence = sequence;
        self
    }

    /// Add a second descriptor for partition 0 after the real one
    pub fn extra_partition(mut self, sequence: u32, start: u32) -> Self {
        self.extra_partitions.push((sequence, start));
        self
    }

    /// Break the CRC of the main sequence's logical volume descriptor
    pub fn corrupt_main_sequence(mut self) -> Self {
        self.corrupt_main = true;
        self
    }

    /// Record the anchor at the last sector only
    pub fn anchor_at_end(mut self) -> Self {
        self.anchor_at_end = true;
        self
    }

    pub fn charset(mut self, charset: &'static [u8]) -> Self {
        self.charset = charset;
        self
    }

    pub fn block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    /// Append a type 2 partition map carrying `identifier`
    pub fn type2_map(mut self, identifier: &'static [u8]) -> Self {
        self.type2_map = Some(identifier);
        self
    }

    fn alloc(&mut self, count: usize) -> u32 {
        let first = self.blocks.len() as u32;
        for _ in 0..count {
            self.blocks.push(vec![0u8; SECTOR]);
        }
        first
    }

    fn tag_version(&self) -> u16 {
        if self.nsr_level == 3 {
            3
        } else {
            2
        }
    }

    /// Write a file entry at `block`
    #[allow(clippy::too_many_arguments)]
    fn file_entry(
        &mut self,
        block: u32,
        file_type: u8,
        extended: bool,
        size: u64,
        ad_flags: u16,
        ads: &[u8],
        permissions: u32,
    ) {
        let version = self.tag_version();
        let (id, data_at, ea_at, ad_at, unique_at, modify_at) = if extended {
            (TAG_EXTENDED_FILE_ENTRY, 0xd8, 0xd0, 0xd4, 0xc8, 0x5c)
        } else {
            (TAG_FILE_ENTRY, 0xb0, 0xa8, 0xac, 0xa0, 0x54)
        };
        let fe = &mut self.blocks[block as usize];
        fe[0x14..0x16].copy_from_slice(&4u16.to_le_bytes());
        fe[0x18..0x1a].copy_from_slice(&1u16.to_le_bytes());
        fe[0x1b] = file_type;
        fe[0x22..0x24].copy_from_slice(&ad_flags.to_le_bytes());
        fe[0x24..0x28].copy_from_slice(&1000u32.to_le_bytes());
        fe[0x28..0x2c].copy_from_slice(&100u32.to_le_bytes());
        fe[0x2c..0x30].copy_from_slice(&permissions.to_le_bytes());
        fe[0x30..0x32].copy_from_slice(&1u16.to_le_bytes());
        fe[0x38..0x40].copy_from_slice(&size.to_le_bytes());
        fe[modify_at..modify_at + 12].copy_from_slice(&MODIFY_TIME);
        fe[unique_at..unique_at + 8].copy_from_slice(&(block as u64 + 16).to_le_bytes());
        fe[ea_at..ea_at + 4].copy_from_slice(&0u32.to_le_bytes());
        fe[ad_at..ad_at + 4].copy_from_slice(&(ads.len() as u32).to_le_bytes());
        fe[data_at..data_at + ads.len()].copy_from_slice(ads);
        stamp(fe, id, version, block, data_at + ads.len() - 16);
    }

    /// Store `data` in fresh blocks; returns the short AD area
    fn data_blocks(&mut self, data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return Vec::new();
        }
        let count = data.len().div_ceil(SECTOR);
        let first = self.alloc(count);
        for (i, piece) in data.chunks(SECTOR).enumerate() {
            self.blocks[first as usize + i][..piece.len()].copy_from_slice(piece);
        }
        short_ad(data.len() as u32, first).to_vec()
    }

    fn emit_node(&mut self, node: &UdfNode, parent: u32) -> (String, u8, [u8; 16]) {
        let version = self.tag_version();
        match node {
            UdfNode::File {
                name,
                data,
                embedded,
                extended,
                hidden,
            } => {
                let fe = self.alloc(1);
                let (flags, ads) = if *embedded {
                    (3u16, data.clone())
                } else {
                    (0u16, self.data_blocks(data))
                };
                // rw-r--r--
                self.file_entry(fe, TYPE_REGULAR, *extended, data.len() as u64, flags, &ads, 0x1884);
                let fid_flags = if *hidden { FID_HIDDEN } else { 0 };
                (name.clone(), fid_flags, long_ad(SECTOR as u32, fe, 0))
            }
            UdfNode::Dir { name, children } => {
                let icb = self.emit_dir(children, Some(parent));
                (name.clone(), FID_DIRECTORY, long_ad(SECTOR as u32, icb, 0))
            }
            UdfNode::Symlink { name, components } => {
                let fe = self.alloc(1);
                let size = components.len() as u64;
                self.file_entry(fe, TYPE_SYMLINK, false, size, 3, components, 0x1ce7);
                (name.clone(), 0, long_ad(SECTOR as u32, fe, 0))
            }
            UdfNode::Deleted { name } => (name.clone(), FID_DELETED, [0u8; 16]),
            UdfNode::Indirect {
                name,
                data,
                nested,
                chained,
            } => {
                let target = self.alloc(1);
                self.file_entry(target, TYPE_REGULAR, false, data.len() as u64, 3, data, 0x1884);
                let mut next = long_ad(SECTOR as u32, target, 0);

                // Indirect entries in last position, followed by the loop
                for _ in 0..*chained {
                    let ie = self.alloc(1);
                    let buf = &mut self.blocks[ie as usize];
                    buf[0x14..0x16].copy_from_slice(&4u16.to_le_bytes());
                    buf[0x1b] = 0;
                    buf[0x24..0x34].copy_from_slice(&next);
                    stamp(buf, TAG_INDIRECT_ENTRY, version, ie, 0x34 - 16);
                    next = long_ad(SECTOR as u32, ie, 0);
                }

                // Two-block ICBs: indirect entry, then terminal entry
                for _ in 0..*nested {
                    let ie = self.alloc(2);
                    let buf = &mut self.blocks[ie as usize];
                    buf[0x14..0x16].copy_from_slice(&4u16.to_le_bytes());
                    buf[0x24..0x34].copy_from_slice(&next);
                    stamp(buf, TAG_INDIRECT_ENTRY, version, ie, 0x34 - 16);
                    let te = &mut self.blocks[ie as usize + 1];
                    te[0x14..0x16].copy_from_slice(&4u16.to_le_bytes());
                    stamp(te, TAG_TERMINAL_ENTRY, version, ie + 1, 0x24 - 16);
                    next = long_ad(2 * SECTOR as u32, ie, 0);
                }
                (name.clone(), 0, next)
            }
        }
    }

    /// Emit a directory and everything below it; returns its ICB block
    fn emit_dir(&mut self, children: &[UdfNode], parent: Option<u32>) -> u32 {
        let version = self.tag_version();
        let icb = self.alloc(1);
        let parent = parent.unwrap_or(icb);

        let mut fids = Vec::new();
        fids.push(fid("", FID_DIRECTORY | FID_PARENT, long_ad(SECTOR as u32, parent, 0), version));
        for child in children {
            let (name, flags, ad) = self.emit_node(child, icb);
            fids.push(fid(&name, flags, ad, version));
        }
        let content: Vec<u8> = fids.concat();
        let ads = self.data_blocks(&content);
        // rwxr-xr-x
        self.file_entry(icb, TYPE_DIRECTORY, false, content.len() as u64, 0, &ads, 0x1ca5);
        icb
    }

    pub fn build(mut self) -> Vec<u8> {
        let version = self.tag_version();
        // Partition block 0 is the file set descriptor
        let fsd_block = self.alloc(1);
        let root_children = std::mem::take(&mut self.root);
        let root = self.emit_dir(&root_children, None);
        {
            let fsd = &mut self.blocks[fsd_block as usize];
            fsd[0x190..0x1a0].copy_from_slice(&long_ad(SECTOR as u32, root, 0));
            stamp(fsd, TAG_FILE_SET, version, fsd_block, 512 - 16);
        }

        let partition_len = self.blocks.len() as u32;
        let total = PARTITION_START + partition_len + 16;
        let mut image = vec![0u8; total as usize * SECTOR];
        for (i, block) in self.blocks.iter().enumerate() {
            let at = (PARTITION_START as usize + i) * SECTOR;
            image[at..at + SECTOR].copy_from_slice(block);
        }

        // Volume recognition, with an optional ISO 9660 tree in front
        let mut vrs = 16u32;
        if let Some(label) = &self.iso_bridge {
            vrs = write_iso_bridge(&mut image, label, self.bridge_joliet.as_deref());
        }
        let nsr: &[u8; 5] = if self.nsr_level == 3 { b"NSR03" } else { b"NSR02" };
        for (i, id) in [b"BEA01", nsr, b"TEA01"].iter().enumerate() {
            let at = (vrs as usize + i) * SECTOR;
            image[at + 1..at + 6].copy_from_slice(*id);
            image[at + 6] = 1;
        }

        for (start, corrupt) in [(MAIN_VDS, self.corrupt_main), (RESERVE_VDS, false)] {
            let sequence = self.sequence(start, partition_len);
            for (i, desc) in sequence.iter().enumerate() {
                let at = (start as usize + i) * SECTOR;
                image[at..at + SECTOR].copy_from_slice(desc);
            }
            if corrupt {
                // Logical volume descriptor body byte: CRC no longer matches
                let lvd = sequence
                    .iter()
                    .position(|d| u16::from_le_bytes([d[0], d[1]]) == TAG_LOGICAL_VOLUME)
                    .unwrap_or(0);
                image[(start as usize + lvd) * SECTOR + 0x60] ^= 0xff;
            }
        }

        let anchor_sector = if self.anchor_at_end { total - 1 } else { ANCHOR };
        let mut avdp = vec![0u8; SECTOR];
        let vds_len = 16 * SECTOR as u32;
        avdp[0x10..0x14].copy_from_slice(&vds_len.to_le_bytes());
        avdp[0x14..0x18].copy_from_slice(&MAIN_VDS.to_le_bytes());
        avdp[0x18..0x1c].copy_from_slice(&vds_len.to_le_bytes());
        avdp[0x1c..0x20].copy_from_slice(&RESERVE_VDS.to_le_bytes());
        stamp(&mut avdp, TAG_ANCHOR, version, anchor_sector, 512 - 16);
        let at = anchor_sector as usize * SECTOR;
        image[at..at + SECTOR].copy_from_slice(&avdp);
        image
    }

    /// Descriptors of one volume descriptor sequence starting at `start`
    fn sequence(&self, start: u32, partition_len: u32) -> Vec<Vec<u8>> {
        let version = self.tag_version();
        let mut out: Vec<Vec<u8>> = Vec::new();
        let mut push = |mut desc: Vec<u8>, id: u16| {
            let location = start + out.len() as u32;
            stamp(&mut desc, id, version, location, 512 - 16);
            out.push(desc);
        };

        let mut pvd = vec![0u8; SECTOR];
        pvd[0x10..0x14].copy_from_slice(&1u32.to_le_bytes());
        pvd[0x18..0x38].copy_from_slice(&dstring::<32>("UDFVOLUME"));
        push(pvd, TAG_PRIMARY_VOLUME);

        let mut iuvd = vec![0u8; SECTOR];
        iuvd[0x15..0x15 + 15].copy_from_slice(b"*UDF LV Info\0\0\0");
        push(iuvd, TAG_IMPLEMENTATION_USE);

        let partition = |sequence: u32, first: u32| {
            let mut pd = vec![0u8; SECTOR];
            pd[0x10..0x14].copy_from_slice(&sequence.to_le_bytes());
            pd[0x16..0x18].copy_from_slice(&0u16.to_le_bytes());
            pd[0xb8..0xbc].copy_from_slice(&1u32.to_le_bytes());
            pd[0xbc..0xc0].copy_from_slice(&first.to_le_bytes());
            pd[0xc0..0xc4].copy_from_slice(&partition_len.to_le_bytes());
            pd
        };
        push(partition(self.partition_sequence, PARTITION_START), TAG_PARTITION);
        for &(sequence, first) in &self.extra_partitions {
            push(partition(sequence, first), TAG_PARTITION);
        }

        let mut lvd = vec![0u8; SECTOR];
        lvd[0x10..0x14].copy_from_slice(&2u32.to_le_bytes());
        lvd[0x15..0x15 + self.charset.len()].copy_from_slice(self.charset);
        lvd[0x54..0xd4].copy_from_slice(&dstring::<128>(&self.label));
        lvd[0xd4..0xd8].copy_from_slice(&self.block_size.to_le_bytes());
        lvd[0xf8..0x108].copy_from_slice(&long_ad(SECTOR as u32, 0, 0));
        lvd[0x1b8..0x1be].copy_from_slice(&[1, 6, 1, 0, 0, 0]);
        let (table_length, count) = match self.type2_map {
            Some(identifier) => {
                let map = &mut lvd[0x1be..0x1be + 64];
                map[0] = 2;
                map[1] = 64;
                map[5..5 + identifier.len()].copy_from_slice(identifier);
                (6 + 64u32, 2u32)
            }
            None => (6, 1),
        };
        lvd[0x108..0x10c].copy_from_slice(&table_length.to_le_bytes());
        lvd[0x10c..0x110].copy_from_slice(&count.to_le_bytes());
        push(lvd, TAG_LOGICAL_VOLUME);

        push(vec![0u8; SECTOR], TAG_TERMINATING);
        out
    }
}

/// One File Identifier Descriptor, padded to four bytes
pub fn fid(name: &str, flags: u8, icb: [u8; 16], version: u16) -> Vec<u8> {
    let ident = if name.is_empty() { Vec::new() } else { cs0(name) };
    let raw_len = 38 + ident.len();
    let mut d = vec![0u8; (raw_len + 3) & !3];
    d[0x10..0x12].copy_from_slice(&1u16.to_le_bytes());
    d[0x12] = flags;
    d[0x13] = ident.len() as u8;
    d[0x14..0x24].copy_from_slice(&icb);
    d[38..38 + ident.len()].copy_from_slice(&ident);
    stamp(&mut d, TAG_FILE_ID, version, 0, raw_len - 16);
    d
}

/// ISO 9660 primary descriptor at 16 with its root at 250 holding a single
/// file `ISO.TXT` at 251. With `joliet`, the primary tree carries Rock Ridge
/// entries and a Joliet descriptor at 17 points at a second root at 252.
/// Returns the sector following the terminator.
fn write_iso_bridge(image: &mut [u8], label: &str, joliet: Option<&str>) -> u32 {
    const ROOT: u32 = 250;
    const FILE: u32 = 251;
    const JOLIET_ROOT: u32 = 252;
    const SPACE: u32 = JOLIET_ROOT + 1;
    let content = b"iso bridge";
    let extensions = joliet.is_some();

    let mut dot_su = Vec::new();
    let mut file_su = Vec::new();
    if extensions {
        dot_su.extend_from_slice(&sp());
        dot_su.extend_from_slice(&er());
        dot_su.extend_from_slice(&px(0o040755, 2));
        file_su.extend_from_slice(&px(0o100644, 1));
        file_su.extend_from_slice(&nm("Rock Ridge.txt"));
    }
    let mut dir = Vec::new();
    dir.extend_from_slice(&record(ROOT, SECTOR as u32, 0x02, &[0], &dot_su));
    dir.extend_from_slice(&record(ROOT, SECTOR as u32, 0x02, &[1], &[]));
    dir.extend_from_slice(&record(FILE, content.len() as u32, 0, b"ISO.TXT;1", &file_su));
    let at = ROOT as usize * SECTOR;
    image[at..at + dir.len()].copy_from_slice(&dir);
    let at = FILE as usize * SECTOR;
    image[at..at + content.len()].copy_from_slice(content);

    let pvd = descriptor(1, &ascii_field(label), SPACE, ROOT, SECTOR as u32, None);
    image[16 * SECTOR..17 * SECTOR].copy_from_slice(&pvd);

    let mut terminator = 17u32;
    if let Some(joliet_label) = joliet {
        let mut dir = Vec::new();
        dir.extend_from_slice(&record(JOLIET_ROOT, SECTOR as u32, 0x02, &[0], &[]));
        dir.extend_from_slice(&record(JOLIET_ROOT, SECTOR as u32, 0x02, &[1], &[]));
        let name = ucs2("Joliet Name.txt;1");
        dir.extend_from_slice(&record(FILE, content.len() as u32, 0, &name, &[]));
        let at = JOLIET_ROOT as usize * SECTOR;
        image[at..at + dir.len()].copy_from_slice(&dir);

        let svd = descriptor(
            2,
            &ucs2_field(joliet_label),
            SPACE,
            JOLIET_ROOT,
            SECTOR as u32,
            Some(*b"%/E"),
        );
        image[17 * SECTOR..18 * SECTOR].copy_from_slice(&svd);
        terminator = 18;
    }

    let at = terminator as usize * SECTOR;
    image[at] = 255;
    image[at + 1..at + 6].copy_from_slice(b"CD001");
    image[at + 6] = 1;
    terminator + 1
}
