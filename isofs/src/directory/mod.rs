//! Directory objects and handles
//!
//! A [`Directory`] is a cursor over a shared, fully buffered directory.
//! Opening an entry goes through the directory's registry of open children
//! first, so one on-disk entry never has two live shared objects.

pub mod entry;
pub mod flags;
pub mod iterator;
pub mod name;
pub mod record;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use tracing::trace;

use crate::error::{IsoFsError, Result};
use crate::file::reader::read_extents;
use crate::file::{File, FileShared};
use crate::object::{ObjectKey, OpenChildren, SharedCore, SharedNode};
use crate::types::{ObjectInfo, ObjectType, OpenFlags, MAX_DIRECTORY_SIZE};
use entry::Decoded;

/// Shared state of one open directory
pub(crate) struct DirShared {
    pub core: SharedCore,
    /// Raw directory content
    pub content: Vec<u8>,
    /// Open children, keyed by on-disk identity
    pub children: OpenChildren,
}

impl DirShared {
    /// Buffer the directory content described by `core`
    pub fn load(core: SharedCore) -> Result<Arc<Self>> {
        let size = core.info.size;
        if size > MAX_DIRECTORY_SIZE {
            return Err(IsoFsError::DirectoryTooBig { size });
        }
        let mut content = Vec::new();
        content.try_reserve_exact(size as usize)?;
        content.resize(size as usize, 0);
        read_extents(core.volume.store(), &core.extents, size, 0, &mut content)?;
        trace!("directory {} loaded, {} bytes", core.key, size);

        Ok(Arc::new(Self {
            core,
            content,
            children: OpenChildren::default(),
        }))
    }

    /// Turn a decoded entry into a shared object
    fn instantiate(self: &Arc<Self>, key: ObjectKey, decoded: Decoded) -> Result<SharedNode> {
        if decoded.interleaved {
            return Err(IsoFsError::UnsupportedObjectType);
        }
        let core = SharedCore::new(
            key,
            decoded.info,
            decoded.extents,
            self.core.volume.clone(),
            Some(self.clone()),
        );
        match decoded.info.object_type() {
            Some(ObjectType::Directory) => Ok(SharedNode::Directory(DirShared::load(core)?)),
            Some(ObjectType::File) => Ok(SharedNode::File(Arc::new(FileShared { core }))),
            _ => Err(IsoFsError::UnsupportedObjectType),
        }
    }

    /// Open the child called `name`, reusing a live shared object
    fn open_child(self: &Arc<Self>, name: &str) -> Result<SharedNode> {
        let loc = self.locate(name)?.ok_or(IsoFsError::NotFound)?;
        if let Some(node) = self.children.get(loc.key) {
            trace!("reusing open child {}", loc.key);
            return Ok(node);
        }
        let decoded = self.decode(&loc)?;
        let node = self.instantiate(loc.key, decoded)?;
        Ok(self.children.register(loc.key, node))
    }
}

/// An open file or directory
pub enum Node {
    /// Regular file
    File(File),
    /// Directory
    Directory(Directory),
}

impl Node {
    pub(crate) fn from_shared(node: SharedNode) -> Self {
        match node {
            SharedNode::File(shared) => Self::File(File::new(shared)),
            SharedNode::Directory(shared) => Self::Directory(Directory::new(shared)),
        }
    }

    /// Metadata of the opened object
    pub fn info(&self) -> ObjectInfo {
        match self {
            Self::File(f) => f.info(),
            Self::Directory(d) => d.info(),
        }
    }
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name
    pub name: String,
    /// Entry metadata (mode type is `S_IFWHT` for deleted UDF entries)
    pub info: ObjectInfo,
}

/// Directory handle with its own listing cursor
#[derive(Clone)]
pub struct Directory {
    shared: Arc<DirShared>,
    position: u32,
}

impl Directory {
    pub(crate) fn new(shared: Arc<DirShared>) -> Self {
        Self {
            shared,
            position: 0,
        }
    }

    /// Open `name` in this directory
    ///
    /// `.` and `..` resolve to this directory and its parent (the root is
    /// its own parent). Any write-type flag fails with
    /// [`IsoFsError::WriteProtected`] before the name is looked up.
    pub fn open(&self, name: &str, flags: OpenFlags) -> Result<Node> {
        if flags.wants_write() {
            return Err(IsoFsError::WriteProtected);
        }
        match name {
            "" => Err(IsoFsError::InvalidPath),
            "." => Ok(Node::Directory(Directory::new(self.shared.clone()))),
            ".." => {
                let parent = self.shared.core.parent.clone();
                Ok(Node::Directory(Directory::new(
                    parent.unwrap_or_else(|| self.shared.clone()),
                )))
            }
            _ => Ok(Node::from_shared(self.shared.open_child(name)?)),
        }
    }

    /// Open a regular file
    pub fn open_file(&self, name: &str) -> Result<File> {
        match self.open(name, OpenFlags::READ)? {
            Node::File(f) => Ok(f),
            Node::Directory(_) => Err(IsoFsError::IsADirectory),
        }
    }

    /// Open a subdirectory
    pub fn open_dir(&self, name: &str) -> Result<Directory> {
        match self.open(name, OpenFlags::READ)? {
            Node::Directory(d) => Ok(d),
            Node::File(_) => Err(IsoFsError::NotADirectory),
        }
    }

    /// Metadata of `name` without opening it
    pub fn stat(&self, name: &str) -> Result<ObjectInfo> {
        match name {
            "." => return Ok(self.info()),
            ".." => {
                return Ok(self
                    .shared
                    .core
                    .parent
                    .as_ref()
                    .map_or(self.info(), |p| p.core.info))
            }
            _ => {}
        }
        let loc = self.shared.locate(name)?.ok_or(IsoFsError::NotFound)?;
        if let Some(node) = self.shared.children.get(loc.key) {
            return Ok(Node::from_shared(node).info());
        }
        Ok(self.shared.decode(&loc)?.info)
    }

    /// Target of the symbolic link `name`
    ///
    /// A target longer than the supported maximum fails with
    /// [`IsoFsError::NameTooLong`] rather than coming back truncated.
    pub fn read_link(&self, name: &str) -> Result<String> {
        let loc = self.shared.locate(name)?.ok_or(IsoFsError::NotFound)?;
        let decoded = self.shared.decode(&loc)?;
        match decoded.symlink {
            Some(target) if decoded.info.is_symlink() => {
                Ok(String::from_utf8_lossy(&target?).into_owned())
            }
            _ => Err(IsoFsError::UnsupportedObjectType),
        }
    }

    fn peek(&self) -> Result<Option<(DirEntry, u32)>> {
        let Some(loc) = self.shared.locate_next(self.position as usize)? else {
            return Ok(None);
        };
        let decoded = self.shared.decode(&loc)?;
        let entry = DirEntry {
            name: decoded.name,
            info: decoded.info,
        };
        Ok(Some((entry, loc.next as u32)))
    }

    /// Read the next entry, copying its name into `name_buf`
    ///
    /// Returns the name length and metadata, or `None` at the end. A short
    /// `name_buf` fails with [`IsoFsError::BufferTooSmall`] carrying the
    /// required length; the cursor stays put so the call can be retried.
    pub fn read_entry(&mut self, name_buf: &mut [u8]) -> Result<Option<(usize, ObjectInfo)>> {
        let Some((entry, next)) = self.peek()? else {
            return Ok(None);
        };
        let name = entry.name.as_bytes();
        if name.len() > name_buf.len() {
            return Err(IsoFsError::BufferTooSmall {
                required: name.len(),
            });
        }
        name_buf[..name.len()].copy_from_slice(name);
        self.position = next;
        Ok(Some((name.len(), entry.info)))
    }

    /// Read the next entry
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        let Some((entry, next)) = self.peek()? else {
            return Ok(None);
        };
        self.position = next;
        Ok(Some(entry))
    }

    /// Restart the listing
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Current cursor (offset into the directory content)
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Metadata of this directory
    pub fn info(&self) -> ObjectInfo {
        self.shared.core.info
    }

    /// Number of children currently open through any handle
    pub fn open_child_count(&self) -> usize {
        self.shared.children.live_count()
    }

    /// Whether both handles refer to the same shared directory
    pub fn same_object(&self, other: &Directory) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Always fails: the medium is read-only
    pub fn create_file(&self, _name: &str) -> Result<File> {
        Err(IsoFsError::WriteProtected)
    }

    /// Always fails: the medium is read-only
    pub fn create_dir(&self, _name: &str) -> Result<Directory> {
        Err(IsoFsError::WriteProtected)
    }

    /// Always fails: the medium is read-only
    pub fn create_symlink(&self, _name: &str, _target: &str) -> Result<()> {
        Err(IsoFsError::WriteProtected)
    }

    /// Always fails: the medium is read-only
    pub fn unlink(&self, _name: &str) -> Result<()> {
        Err(IsoFsError::WriteProtected)
    }

    /// Always fails: the medium is read-only
    pub fn rename(&self, _from: &str, _to: &str) -> Result<()> {
        Err(IsoFsError::WriteProtected)
    }
}

impl Iterator for Directory {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next_entry().transpose();
        if let Some(Err(_)) = item {
            // A corrupt entry ends the listing
            self.position = self.shared.content.len() as u32;
        }
        item
    }
}
