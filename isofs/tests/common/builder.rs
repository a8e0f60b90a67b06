//! In-memory ISO 9660 image builder
//!
//! Lays out a primary tree, optionally a Joliet tree sharing the same file
//! data, and optionally Rock Ridge entries on the primary tree.

use std::collections::HashMap;

pub const SECTOR: usize = 2048;

/// 2020-06-15 12:30:00 UTC in directory record form
pub const RECORD_TIME: [u8; 7] = [120, 6, 15, 12, 30, 0, 0];

const FLAG_HIDDEN: u8 = 0x01;
const FLAG_DIRECTORY: u8 = 0x02;
const FLAG_MULTI_EXTENT: u8 = 0x80;

#[derive(Debug, Clone)]
enum Kind {
    Dir,
    File {
        data: Vec<u8>,
        /// Split into extents of this many bytes
        chunk: Option<usize>,
    },
    Symlink {
        target: String,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: Kind,
    hidden: bool,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tree {
    Primary,
    Joliet,
}

pub struct IsoBuilder {
    label: String,
    joliet_label: Option<String>,
    rock_ridge: bool,
    continuation: bool,
    udf_recognition: bool,
    nodes: Vec<Node>,
}

impl IsoBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            joliet_label: None,
            rock_ridge: false,
            continuation: false,
            udf_recognition: false,
            nodes: vec![Node {
                name: String::new(),
                kind: Kind::Dir,
                hidden: false,
                children: Vec::new(),
            }],
        }
    }

    /// Add a Joliet tree labelled `label`
    pub fn joliet(mut self, label: &str) -> Self {
        self.joliet_label = Some(label.to_string());
        self
    }

    /// Record Rock Ridge entries on the primary tree
    pub fn rock_ridge(mut self) -> Self {
        self.rock_ridge = true;
        self
    }

    /// Move every Rock Ridge `NM` and `SL` entry into one continuation sector
    pub fn rock_ridge_continuation(mut self) -> Self {
        self.rock_ridge = true;
        self.continuation = true;
        self
    }

    /// Append a BEA01/NSR02/TEA01 recognition sequence without any UDF
    /// structures behind it
    pub fn udf_recognition(mut self) -> Self {
        self.udf_recognition = true;
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.insert(path, Kind::Dir, false);
        self
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        let kind = Kind::File {
            data: data.to_vec(),
            chunk: None,
        };
        self.insert(path, kind, false);
        self
    }

    pub fn hidden_file(mut self, path: &str, data: &[u8]) -> Self {
        let kind = Kind::File {
            data: data.to_vec(),
            chunk: None,
        };
        self.insert(path, kind, true);
        self
    }

    /// A file recorded as a multi-extent chain of `chunk`-byte pieces,
    /// with an unused sector between pieces
    pub fn multi_extent_file(mut self, path: &str, data: &[u8], chunk: usize) -> Self {
        assert_eq!(chunk % SECTOR, 0);
        let kind = Kind::File {
            data: data.to_vec(),
            chunk: Some(chunk),
        };
        self.insert(path, kind, false);
        self
    }

    /// A Rock Ridge symbolic link (a plain empty file without Rock Ridge)
    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let kind = Kind::Symlink {
            target: target.to_string(),
        };
        self.insert(path, kind, false);
        self
    }

    fn insert(&mut self, path: &str, kind: Kind, hidden: bool) {
        let mut parent = 0usize;
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            let found = self.nodes[parent]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].name == *part);
            match found {
                Some(existing) if !last => parent = existing,
                Some(_) => panic!("duplicate path {path}"),
                None => {
                    let node = Node {
                        name: part.to_string(),
                        kind: if last { kind.clone() } else { Kind::Dir },
                        hidden: last && hidden,
                        children: Vec::new(),
                    };
                    self.nodes.push(node);
                    let id = self.nodes.len() - 1;
                    self.nodes[parent].children.push(id);
                    parent = id;
                }
            }
        }
    }

    fn is_dir(&self, id: usize) -> bool {
        matches!(self.nodes[id].kind, Kind::Dir)
    }

    /// 8-bit identifier of a node on the primary tree
    fn iso_identifier(&self, id: usize) -> Vec<u8> {
        let name = self.nodes[id].name.to_ascii_uppercase();
        if self.is_dir(id) {
            name.into_bytes()
        } else {
            format!("{name};1").into_bytes()
        }
    }

    /// UCS-2 identifier of a node on the Joliet tree
    fn joliet_identifier(&self, id: usize) -> Vec<u8> {
        let name = if self.is_dir(id) {
            self.nodes[id].name.clone()
        } else {
            format!("{};1", self.nodes[id].name)
        };
        ucs2(&name)
    }

    fn record_flags(&self, id: usize) -> u8 {
        let mut flags = 0;
        if self.is_dir(id) {
            flags |= FLAG_DIRECTORY;
        }
        if self.nodes[id].hidden {
            flags |= FLAG_HIDDEN;
        }
        flags
    }

    /// Rock Ridge system use bytes of a child record, plus its `NM` and `SL`
    /// entries when those go to the continuation sector
    fn rock_ridge_su(&self, id: usize, ce_slot: Option<(u32, u32)>) -> (Vec<u8>, Vec<u8>) {
        let node = &self.nodes[id];
        let mut su = match &node.kind {
            Kind::Dir => px(0o040755, 2),
            Kind::File { .. } => px(0o100644, 1),
            Kind::Symlink { .. } => px(0o120777, 1),
        };
        let mut tail = nm(&node.name);
        if let Kind::Symlink { target } = &node.kind {
            tail.extend_from_slice(&sl(target));
        }
        let mut spilled = Vec::new();
        match ce_slot {
            Some((block, offset)) => {
                su.extend_from_slice(&ce(block, offset, tail.len() as u32));
                spilled = tail;
            }
            None => su.extend_from_slice(&tail),
        }
        (su, spilled)
    }

    pub fn build(self) -> Vec<u8> {
        // Descriptors
        let mut next = 16u32;
        let pvd_lba = next;
        next += 1;
        let svd_lba = self.joliet_label.as_ref().map(|_| {
            next += 1;
            next - 1
        });
        let term_lba = next;
        next += 1;
        if self.udf_recognition {
            next += 3;
        }
        let ce_lba = self.continuation.then(|| {
            next += 1;
            next - 1
        });

        // File data
        let mut extents: HashMap<usize, Vec<(u32, u32)>> = HashMap::new();
        for id in 0..self.nodes.len() {
            let Kind::File { data, chunk } = &self.nodes[id].kind else {
                continue;
            };
            let chunk = chunk.unwrap_or(data.len().max(1));
            let mut parts = Vec::new();
            let mut offset = 0usize;
            loop {
                let len = (data.len() - offset).min(chunk);
                parts.push((next, len as u32));
                next += (len.div_ceil(SECTOR) as u32).max(1);
                offset += len;
                if offset >= data.len() {
                    break;
                }
                // Leave a gap so the pieces never merge
                next += 1;
            }
            extents.insert(id, parts);
        }

        // Directory extents, primary then Joliet
        let mut dirs: HashMap<(Tree, usize), (u32, u32)> = HashMap::new();
        let trees: Vec<Tree> = if self.joliet_label.is_some() {
            vec![Tree::Primary, Tree::Joliet]
        } else {
            vec![Tree::Primary]
        };
        for &tree in &trees {
            for id in self.dir_ids() {
                let records =
                    self.dir_records(tree, id, &extents, &dirs, ce_lba, &mut 0, &mut Vec::new());
                let size = pack(&records).len() as u32;
                dirs.insert((tree, id), (next, size));
                next += size / SECTOR as u32;
            }
        }

        let total = next + 1;
        let mut image = vec![0u8; total as usize * SECTOR];

        // File contents
        for (id, parts) in &extents {
            let Kind::File { data, .. } = &self.nodes[*id].kind else {
                unreachable!()
            };
            let mut offset = 0usize;
            for &(lba, len) in parts {
                let at = lba as usize * SECTOR;
                image[at..at + len as usize].copy_from_slice(&data[offset..offset + len as usize]);
                offset += len as usize;
            }
        }

        // Directories
        let mut ce_offset = 0u32;
        let mut ce_area = Vec::new();
        for &tree in &trees {
            for id in self.dir_ids() {
                let (lba, size) = dirs[&(tree, id)];
                let mut spilled = Vec::new();
                let records = self.dir_records(
                    tree,
                    id,
                    &extents,
                    &dirs,
                    ce_lba,
                    &mut ce_offset,
                    &mut spilled,
                );
                ce_area.extend_from_slice(&spilled);
                let packed = pack(&records);
                assert_eq!(packed.len() as u32, size);
                let at = lba as usize * SECTOR;
                image[at..at + packed.len()].copy_from_slice(&packed);
            }
        }
        if let Some(lba) = ce_lba {
            assert!(ce_area.len() <= SECTOR, "continuation area overflows");
            let at = lba as usize * SECTOR;
            image[at..at + ce_area.len()].copy_from_slice(&ce_area);
        }

        // Volume descriptors
        let (root_lba, root_size) = dirs[&(Tree::Primary, 0)];
        let pvd = descriptor(1, &ascii_field(&self.label), total, root_lba, root_size, None);
        put(&mut image, pvd_lba, &pvd);
        if let (Some(lba), Some(label)) = (svd_lba, &self.joliet_label) {
            let (jroot, jsize) = dirs[&(Tree::Joliet, 0)];
            let svd = descriptor(2, &ucs2_field(label), total, jroot, jsize, Some(*b"%/E"));
            put(&mut image, lba, &svd);
        }
        let mut term = vec![0u8; SECTOR];
        term[0] = 255;
        term[1..6].copy_from_slice(b"CD001");
        term[6] = 1;
        put(&mut image, term_lba, &term);
        if self.udf_recognition {
            for (i, id) in [b"BEA01", b"NSR02", b"TEA01"].iter().enumerate() {
                put(&mut image, term_lba + 1 + i as u32, &recognition(id));
            }
        }
        image
    }

    fn dir_ids(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&id| self.is_dir(id)).collect()
    }

    fn parent_of(&self, id: usize) -> usize {
        (0..self.nodes.len())
            .find(|&p| self.nodes[p].children.contains(&id))
            .unwrap_or(0)
    }

    #[allow(clippy::too_many_arguments)]
    fn dir_records(
        &self,
        tree: Tree,
        id: usize,
        extents: &HashMap<usize, Vec<(u32, u32)>>,
        dirs: &HashMap<(Tree, usize), (u32, u32)>,
        ce_lba: Option<u32>,
        ce_offset: &mut u32,
        spilled: &mut Vec<u8>,
    ) -> Vec<Vec<u8>> {
        let rr = self.rock_ridge && tree == Tree::Primary;
        let (self_lba, self_size) = dirs.get(&(tree, id)).copied().unwrap_or((0, 0));
        let parent = self.parent_of(id);
        let (parent_lba, parent_size) = dirs.get(&(tree, parent)).copied().unwrap_or((0, 0));

        let mut dot_su = Vec::new();
        if rr && id == 0 {
            dot_su.extend_from_slice(&sp());
            dot_su.extend_from_slice(&er());
            dot_su.extend_from_slice(&px(0o040755, 2));
        }
        let mut records = vec![
            record(self_lba, self_size, FLAG_DIRECTORY, &[0], &dot_su),
            record(parent_lba, parent_size, FLAG_DIRECTORY, &[1], &[]),
        ];

        let mut children = self.nodes[id].children.clone();
        children.sort_by_key(|&c| self.iso_identifier(c));
        for child in children {
            let ident = match tree {
                Tree::Primary => self.iso_identifier(child),
                Tree::Joliet => self.joliet_identifier(child),
            };
            let su = if rr {
                let slot = ce_lba.map(|lba| (lba, *ce_offset));
                let (su, nm) = self.rock_ridge_su(child, slot);
                *ce_offset += nm.len() as u32;
                spilled.extend_from_slice(&nm);
                su
            } else {
                Vec::new()
            };
            let flags = self.record_flags(child);

            match &self.nodes[child].kind {
                Kind::Dir => {
                    let (lba, size) = dirs.get(&(tree, child)).copied().unwrap_or((0, 0));
                    records.push(record(lba, size, flags, &ident, &su));
                }
                Kind::File { .. } => {
                    let parts = &extents[&child];
                    for (i, &(lba, len)) in parts.iter().enumerate() {
                        let more = if i + 1 < parts.len() {
                            FLAG_MULTI_EXTENT
                        } else {
                            0
                        };
                        records.push(record(lba, len, flags | more, &ident, &su));
                    }
                }
                Kind::Symlink { .. } => records.push(record(0, 0, flags, &ident, &su)),
            }
        }
        records
    }
}

/// Lay records out in sectors; a record never crosses a sector boundary
fn pack(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for rec in records {
        let used = out.len() % SECTOR;
        if used + rec.len() > SECTOR {
            out.resize(out.len() + SECTOR - used, 0);
        }
        out.extend_from_slice(rec);
    }
    let padded = out.len().div_ceil(SECTOR).max(1) * SECTOR;
    out.resize(padded, 0);
    out
}

fn put(image: &mut [u8], lba: u32, sector: &[u8]) {
    let at = lba as usize * SECTOR;
    image[at..at + sector.len()].copy_from_slice(sector);
}

pub fn both32(value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&value.to_le_bytes());
    out[4..].copy_from_slice(&value.to_be_bytes());
    out
}

pub fn both16(value: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..2].copy_from_slice(&value.to_le_bytes());
    out[2..].copy_from_slice(&value.to_be_bytes());
    out
}

pub fn ucs2(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

pub fn ascii_field(s: &str) -> [u8; 32] {
    let mut out = [b' '; 32];
    out[..s.len()].copy_from_slice(s.as_bytes());
    out
}

pub fn ucs2_field(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    for pair in out.chunks_exact_mut(2) {
        pair.copy_from_slice(&[0x00, 0x20]);
    }
    let raw = ucs2(s);
    out[..raw.len()].copy_from_slice(&raw);
    out
}

/// One directory record
pub fn record(lba: u32, size: u32, flags: u8, ident: &[u8], su: &[u8]) -> Vec<u8> {
    let pad = 1 - ident.len() % 2;
    let len = 33 + ident.len() + pad + su.len();
    assert!(len <= 255, "directory record too long");
    let mut rec = vec![0u8; len];
    rec[0] = len as u8;
    rec[2..10].copy_from_slice(&both32(lba));
    rec[10..18].copy_from_slice(&both32(size));
    rec[18..25].copy_from_slice(&RECORD_TIME);
    rec[25] = flags;
    rec[28..32].copy_from_slice(&both16(1));
    rec[32] = ident.len() as u8;
    rec[33..33 + ident.len()].copy_from_slice(ident);
    rec[33 + ident.len() + pad..].copy_from_slice(su);
    rec
}

/// Primary (type 1) or supplementary (type 2) volume descriptor
pub fn descriptor(
    type_code: u8,
    volume_id: &[u8; 32],
    space: u32,
    root_lba: u32,
    root_size: u32,
    escape: Option<[u8; 3]>,
) -> Vec<u8> {
    let mut d = vec![0u8; SECTOR];
    d[0] = type_code;
    d[1..6].copy_from_slice(b"CD001");
    d[6] = 1;
    d[8..40].copy_from_slice(&ascii_field("LINUX"));
    d[40..72].copy_from_slice(volume_id);
    d[80..88].copy_from_slice(&both32(space));
    if let Some(esc) = escape {
        d[88..91].copy_from_slice(&esc);
    }
    d[120..124].copy_from_slice(&both16(1));
    d[124..128].copy_from_slice(&both16(1));
    d[128..132].copy_from_slice(&both16(SECTOR as u16));
    let root = record(root_lba, root_size, FLAG_DIRECTORY, &[0], &[]);
    d[156..190].copy_from_slice(&root);
    d[813..830].copy_from_slice(b"2021010112000000\0");
    d[830..847].copy_from_slice(b"2021010112000000\0");
    d[881] = 1;
    d
}

fn recognition(id: &[u8; 5]) -> Vec<u8> {
    let mut d = vec![0u8; SECTOR];
    d[1..6].copy_from_slice(id);
    d[6] = 1;
    d
}

// System Use entries

pub fn sp() -> Vec<u8> {
    vec![b'S', b'P', 7, 1, 0xBE, 0xEF, 0]
}

pub fn er() -> Vec<u8> {
    let id = b"RRIP_1991A";
    let mut e = vec![b'E', b'R', (8 + id.len()) as u8, 1, id.len() as u8, 0, 0, 1];
    e.extend_from_slice(id);
    e
}

pub fn px(mode: u32, links: u32) -> Vec<u8> {
    let mut e = vec![b'P', b'X', 36, 1];
    for v in [mode, links, 1000, 100] {
        e.extend_from_slice(&both32(v));
    }
    e
}

pub fn nm(name: &str) -> Vec<u8> {
    let mut e = vec![b'N', b'M', (5 + name.len()) as u8, 1, 0];
    e.extend_from_slice(name.as_bytes());
    e
}

fn ce(block: u32, offset: u32, length: u32) -> Vec<u8> {
    let mut e = vec![b'C', b'E', 28, 1];
    for v in [block, offset, length] {
        e.extend_from_slice(&both32(v));
    }
    e
}

/// `SL` entries for a relative or absolute target, chained with the
/// continue flag when the components do not fit one entry
fn sl(target: &str) -> Vec<u8> {
    let mut components: Vec<Vec<u8>> = Vec::new();
    let mut rest = target;
    if let Some(stripped) = target.strip_prefix('/') {
        components.push(vec![0x08, 0]);
        rest = stripped;
    }
    for part in rest.split('/').filter(|p| !p.is_empty()) {
        match part {
            "." => components.push(vec![0x02, 0]),
            ".." => components.push(vec![0x04, 0]),
            name => {
                let mut c = vec![0, name.len() as u8];
                c.extend_from_slice(name.as_bytes());
                components.push(c);
            }
        }
    }

    let mut entries: Vec<Vec<u8>> = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    for component in components {
        if !body.is_empty() && 5 + body.len() + component.len() > 255 {
            entries.push(std::mem::take(&mut body));
        }
        body.extend_from_slice(&component);
    }
    entries.push(body);

    let count = entries.len();
    let mut out = Vec::new();
    for (i, body) in entries.into_iter().enumerate() {
        let flags = if i + 1 < count { 0x01 } else { 0 };
        out.extend_from_slice(&[b'S', b'L', (5 + body.len()) as u8, 1, flags]);
        out.extend_from_slice(&body);
    }
    out
}
