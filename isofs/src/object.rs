//! Shared object core and open-child registry
//!
//! Every open file or directory is backed by exactly one shared object per
//! on-disk entry. A child holds a strong reference to its parent directory;
//! the parent only keeps weak references to its open children, keyed by the
//! on-disk identity of the entry. Dropping the last handle of a child removes
//! it from the registry and then releases the parent, which may in turn
//! release its own parent, up to the root and the volume.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};

use crate::directory::DirShared;
use crate::file::extent::ExtentList;
use crate::file::FileShared;
use crate::types::ObjectInfo;
use crate::volume::VolumeInner;

/// On-disk identity of an entry within its parent directory
pub(crate) type ObjectKey = u64;

/// State common to files and directories
pub(crate) struct SharedCore {
    /// Identity within the parent
    pub key: ObjectKey,
    /// Decoded metadata
    pub info: ObjectInfo,
    /// Data extents
    pub extents: ExtentList,
    /// Owning volume
    pub volume: Arc<VolumeInner>,
    /// Parent directory, `None` for the root. Declared last so it is
    /// released after everything else.
    pub parent: Option<Arc<DirShared>>,
}

impl SharedCore {
    pub fn new(
        key: ObjectKey,
        info: ObjectInfo,
        extents: ExtentList,
        volume: Arc<VolumeInner>,
        parent: Option<Arc<DirShared>>,
    ) -> Self {
        Self {
            key,
            info,
            extents,
            volume,
            parent,
        }
    }
}

impl Drop for SharedCore {
    fn drop(&mut self) {
        if let Some(parent) = &self.parent {
            parent.children.forget(self.key);
        }
    }
}

/// Weak link from a directory to one of its open children
#[derive(Clone)]
pub(crate) enum OpenChild {
    File(Weak<FileShared>),
    Directory(Weak<DirShared>),
}

impl OpenChild {
    fn is_live(&self) -> bool {
        match self {
            Self::File(w) => w.strong_count() > 0,
            Self::Directory(w) => w.strong_count() > 0,
        }
    }
}

/// A live child returned from the registry
pub(crate) enum SharedNode {
    File(Arc<FileShared>),
    Directory(Arc<DirShared>),
}

impl SharedNode {
    fn downgrade(&self) -> OpenChild {
        match self {
            Self::File(a) => OpenChild::File(Arc::downgrade(a)),
            Self::Directory(a) => OpenChild::Directory(Arc::downgrade(a)),
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::File(a), Self::File(b)) => Arc::ptr_eq(a, b),
            (Self::Directory(a), Self::Directory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Open children of one directory
///
/// No strong reference is ever dropped while the lock is held: dropping one
/// re-enters [`OpenChildren::forget`] through [`SharedCore`]'s destructor.
#[derive(Default)]
pub(crate) struct OpenChildren {
    map: spin::Mutex<BTreeMap<ObjectKey, OpenChild>>,
}

impl OpenChildren {
    /// Live child registered under `key`
    pub fn get(&self, key: ObjectKey) -> Option<SharedNode> {
        let map = self.map.lock();
        match map.get(&key)? {
            OpenChild::File(w) => w.upgrade().map(SharedNode::File),
            OpenChild::Directory(w) => w.upgrade().map(SharedNode::Directory),
        }
    }

    /// Register `node` under `key`, unless another thread got there first.
    /// Returns whichever object is registered afterwards.
    pub fn register(&self, key: ObjectKey, node: SharedNode) -> SharedNode {
        let existing = {
            let mut map = self.map.lock();
            let existing = match map.get(&key) {
                Some(OpenChild::File(w)) => w.upgrade().map(SharedNode::File),
                Some(OpenChild::Directory(w)) => w.upgrade().map(SharedNode::Directory),
                None => None,
            };
            if existing.is_none() {
                map.insert(key, node.downgrade());
            }
            existing
        };
        match existing {
            // `node` is dropped here, outside the lock
            Some(winner) if !winner.ptr_eq(&node) => winner,
            _ => node,
        }
    }

    /// Drop the entry for `key` if nothing keeps it alive any more
    pub fn forget(&self, key: ObjectKey) {
        let mut map = self.map.lock();
        if map.get(&key).is_some_and(|child| !child.is_live()) {
            map.remove(&key);
        }
    }

    /// Number of children currently open
    pub fn live_count(&self) -> usize {
        self.map.lock().values().filter(|c| c.is_live()).count()
    }
}
