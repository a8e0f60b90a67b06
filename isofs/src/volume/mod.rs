//! Volume mounting
//!
//! ISO9660 volume descriptors start at sector 16 and describe the filesystem
//! layout. Multiple descriptors may be present (Primary, Supplementary, Boot
//! Record), possibly followed by a UDF volume recognition sequence. Mounting
//! picks one tree: UDF first, then Joliet, then the primary tree (with Rock
//! Ridge when the root announces it).

pub mod descriptor;
pub mod primary;
pub mod supplementary;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;

use tracing::{debug, warn};

use crate::directory::name::NameEncoding;
use crate::directory::record::DirectoryRecord;
use crate::directory::{DirShared, Directory, Node};
use crate::error::{IsoFsError, Result};
use crate::extensions::rock_ridge::{self, ScratchSector, SuspScanner};
use crate::file::extent::{Extent, ExtentList};
use crate::object::SharedCore;
use crate::store::ByteStore;
use crate::types::{
    mode, MountOptions, ObjectInfo, OpenFlags, VolumeType, MAX_PATH_COMPONENTS, SECTOR_SIZE,
};
use crate::udf::icb::read_icb;
use crate::udf::{sequence, UdfVolumeInfo};
use crate::utils::datetime::Timestamp;
use crate::utils::string::{decode_ascii, decode_joliet_label};
use descriptor::{DescriptorSet, IsoTree};

/// Facts about the ISO 9660 descriptor set of a mounted volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoVolumeInfo {
    /// Logical block size
    pub block_size: u32,
    /// Volume space size in blocks
    pub volume_space_size: u32,
    /// Volume set size
    pub volume_set_size: u16,
    /// Volume sequence number
    pub volume_sequence: u16,
    /// Primary volume identifier
    pub volume_id: String,
    /// System identifier
    pub system_id: String,
    /// Volume creation time
    pub creation_time: Option<Timestamp>,
    /// Joliet level when a Joliet descriptor was accepted
    pub joliet_level: Option<u8>,
    /// Boot records seen
    pub boot_records: u32,
}

/// Volume state shared by every open object
pub(crate) struct VolumeInner {
    pub store: Arc<dyn ByteStore>,
    pub volume_type: VolumeType,
    pub encoding: NameEncoding,
    /// Logical block size of the selected tree
    pub block_size: u32,
    pub label: String,
    pub iso: Option<IsoVolumeInfo>,
    pub udf: Option<UdfVolumeInfo>,
    /// SUSP skip length when Rock Ridge is in use
    pub rock_ridge: Option<usize>,
    /// Continuation-area cache for Rock Ridge scans
    pub scratch: ScratchSector,
}

impl VolumeInner {
    pub fn store(&self) -> &dyn ByteStore {
        &*self.store
    }
}

/// A mounted ISO 9660 / Joliet / UDF volume
pub struct Volume {
    inner: Arc<VolumeInner>,
    root: Arc<DirShared>,
}

/// Mount `store` (shorthand for [`Volume::open`])
pub fn open<S: ByteStore + 'static>(store: S, options: MountOptions) -> Result<Volume> {
    Volume::open(store, options)
}

impl Volume {
    /// Scan the descriptors on `store` and mount the preferred tree
    pub fn open<S: ByteStore + 'static>(store: S, options: MountOptions) -> Result<Self> {
        let store: Arc<dyn ByteStore> = Arc::new(store);
        let set = descriptor::scan(&*store, &options)?;
        let iso = iso_info(&set);

        if let (Some(level), false) = (set.udf_level, options.no_udf) {
            let mounted = sequence::load(&*store, level)
                .and_then(|udf| Self::mount_udf(store.clone(), udf, iso.clone()));
            match mounted {
                Ok(volume) => return Ok(volume),
                Err(e) if set.primary.is_some() => {
                    warn!("udf: cannot mount ({}), falling back to ISO 9660", e);
                }
                Err(e) => return Err(e),
            }
        }

        if options.joliet_enabled() {
            if let Some((tree, _)) = set.joliet.as_ref() {
                let label = decode_joliet_label(&tree.descriptor.volume_id);
                return Self::mount_iso(store, tree, VolumeType::Joliet, label, iso, false);
            }
        }

        let tree = set.primary.as_ref().ok_or(IsoFsError::NotIsoImage)?;
        let label = decode_ascii(&tree.descriptor.volume_id);
        let rock_ridge = options.rock_ridge_enabled();
        Self::mount_iso(store, tree, VolumeType::Iso9660, label, iso, rock_ridge)
    }

    fn mount_udf(
        store: Arc<dyn ByteStore>,
        udf: UdfVolumeInfo,
        iso: Option<IsoVolumeInfo>,
    ) -> Result<Self> {
        let object = read_icb(&*store, &udf, udf.root_icb, false)?;
        if !object.info.is_directory() {
            return Err(IsoFsError::InvalidUdfVolume {
                reason: "root ICB is not a directory",
            });
        }
        debug!("mounting UDF volume {:?}", udf.logical_volume_id);
        let key = udf.root_icb.block as u64;

        let inner = Arc::new(VolumeInner {
            store,
            volume_type: VolumeType::Udf,
            encoding: NameEncoding::Ascii,
            block_size: udf.block_size,
            label: udf.logical_volume_id.clone(),
            iso,
            rock_ridge: None,
            scratch: ScratchSector::new(None),
            udf: Some(udf),
        });
        let core = SharedCore::new(key, object.info, object.extents, inner.clone(), None);
        let root = DirShared::load(core)?;
        Ok(Self { inner, root })
    }

    fn mount_iso(
        store: Arc<dyn ByteStore>,
        tree: &IsoTree,
        volume_type: VolumeType,
        label: String,
        iso: Option<IsoVolumeInfo>,
        rock_ridge: bool,
    ) -> Result<Self> {
        let block_size = tree.block_size;
        let root_offset = tree.root.extent as u64 * block_size as u64;
        let record = DirectoryRecord::parse(
            &tree.descriptor.root_directory_record,
            tree.root.record_offset,
        )?;
        let recorded = record.recording_time();
        let time = if recorded.is_valid() {
            recorded.to_timestamp()
        } else {
            Timestamp::EPOCH
        };

        let scratch = ScratchSector::new(None);
        let mut first = vec![0u8; SECTOR_SIZE.min(tree.root.size as usize)];
        let mut susp_skip = None;
        if rock_ridge {
            // The root's "." record announces SUSP and Rock Ridge
            store.read_at(root_offset, &mut first)?;
            if let Ok(dot) = DirectoryRecord::parse(&first, root_offset) {
                susp_skip = rock_ridge::detect(&*store, &scratch, block_size as u64, &dot);
            }
        }
        let encoding = match (volume_type, susp_skip) {
            (VolumeType::Joliet, _) => NameEncoding::Utf16Be,
            (_, Some(_)) => NameEncoding::RockRidge,
            _ => NameEncoding::Ascii,
        };
        debug!(
            "mounting {:?} tree at block {}, rock ridge {}",
            volume_type,
            tree.root.extent,
            susp_skip.is_some()
        );

        let mut info = ObjectInfo {
            size: tree.root.size as u64,
            allocated: (tree.root.size as u64).div_ceil(block_size as u64) * block_size as u64,
            access: time,
            modify: time,
            change: time,
            birth: time,
            mode: mode::S_IFDIR | 0o555,
            inode: tree.root.record_offset,
            hidden: record.flags().hidden,
            ..ObjectInfo::default()
        };

        let inner = Arc::new(VolumeInner {
            store,
            volume_type,
            encoding,
            block_size,
            label,
            iso,
            udf: None,
            rock_ridge: susp_skip,
            scratch,
        });

        if let Some(skip) = susp_skip {
            if let Ok(dot) = DirectoryRecord::parse(&first, root_offset) {
                let rr = SuspScanner::new(inner.store(), &inner.scratch, block_size as u64, skip)
                    .scan(&dot);
                if rr.is_valid() {
                    rr.apply(&mut info);
                }
            }
        }

        let extents = ExtentList::single(Extent::new(root_offset, tree.root.size as u64));
        let core = SharedCore::new(tree.root.record_offset, info, extents, inner.clone(), None);
        let root = DirShared::load(core)?;
        Ok(Self { inner, root })
    }

    /// Volume label: the Joliet, UDF logical volume or primary identifier,
    /// whichever tree was mounted
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Mounted tree
    pub fn volume_type(&self) -> VolumeType {
        self.inner.volume_type
    }

    /// Rock Ridge names and attributes are in use
    pub fn has_rock_ridge(&self) -> bool {
        self.inner.rock_ridge.is_some()
    }

    /// UDF volume description, when mounted as UDF
    pub fn udf_info(&self) -> Option<&UdfVolumeInfo> {
        self.inner.udf.as_ref()
    }

    /// ISO 9660 descriptor facts, when the image has a primary descriptor
    pub fn iso_info(&self) -> Option<&IsoVolumeInfo> {
        self.inner.iso.as_ref()
    }

    /// Logical block size of the mounted tree
    pub fn block_size(&self) -> u32 {
        self.inner.block_size
    }

    /// Open the root directory
    pub fn open_root(&self) -> Directory {
        Directory::new(self.root.clone())
    }

    /// Open a `/`-separated path from the root
    pub fn open_path(&self, path: &str) -> Result<Node> {
        if path.split('/').filter(|c| !c.is_empty()).count() > MAX_PATH_COMPONENTS {
            return Err(IsoFsError::PathTooLong);
        }
        let mut node = Node::Directory(self.open_root());
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            let dir = match node {
                Node::Directory(dir) => dir,
                Node::File(_) => return Err(IsoFsError::NotADirectory),
            };
            node = dir.open(component, OpenFlags::READ)?;
        }
        Ok(node)
    }

    /// Metadata of the object at `path`
    pub fn stat(&self, path: &str) -> Result<ObjectInfo> {
        Ok(self.open_path(path)?.info())
    }
}

fn iso_info(set: &DescriptorSet) -> Option<IsoVolumeInfo> {
    let tree = set.primary.as_ref()?;
    let pvd = &tree.descriptor;
    Some(IsoVolumeInfo {
        block_size: tree.block_size,
        volume_space_size: tree.volume_space_size,
        volume_set_size: tree.volume_set_size,
        volume_sequence: tree.volume_sequence,
        volume_id: decode_ascii(&pvd.volume_id),
        system_id: decode_ascii(&pvd.system_id),
        creation_time: pvd
            .creation_time
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.to_timestamp()),
        joliet_level: set.joliet.as_ref().map(|(_, level)| *level),
        boot_records: set.boot_records,
    })
}
