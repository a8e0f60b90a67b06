//! Common types and constants

use crate::utils::datetime::Timestamp;

/// CD / DVD sector size (always 2048 bytes)
pub const SECTOR_SIZE: usize = 2048;

/// Volume descriptor set starts at sector 16
pub const VOLUME_DESCRIPTOR_START: u64 = 16;

/// Volume descriptors scanned before giving up
pub const MAX_VOLUME_DESCRIPTORS: u32 = 32;

/// Largest directory we buffer in memory
pub const MAX_DIRECTORY_SIZE: u64 = 32 * 1024 * 1024;

/// Maximum number of components in a path handed to `Volume::open_path`
pub const MAX_PATH_COMPONENTS: usize = 128;

/// Maximum name length we produce (bytes of UTF-8)
pub const MAX_NAME_LENGTH: usize = 1024;

/// File type and permission bits, POSIX layout
pub mod mode {
    /// File type mask
    pub const S_IFMT: u32 = 0o170000;
    /// FIFO
    pub const S_IFIFO: u32 = 0o010000;
    /// Character device
    pub const S_IFCHR: u32 = 0o020000;
    /// Directory
    pub const S_IFDIR: u32 = 0o040000;
    /// Block device
    pub const S_IFBLK: u32 = 0o060000;
    /// Regular file
    pub const S_IFREG: u32 = 0o100000;
    /// Symbolic link
    pub const S_IFLNK: u32 = 0o120000;
    /// Socket
    pub const S_IFSOCK: u32 = 0o140000;
    /// Whiteout (deleted UDF entry)
    pub const S_IFWHT: u32 = 0o160000;

    /// Set-user-id
    pub const S_ISUID: u32 = 0o4000;
    /// Set-group-id
    pub const S_ISGID: u32 = 0o2000;
    /// Sticky
    pub const S_ISVTX: u32 = 0o1000;
    /// Permission bits mask
    pub const PERM_MASK: u32 = 0o7777;
}

/// Which tree a volume was mounted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    /// Plain ISO 9660 primary tree (optionally with Rock Ridge names)
    Iso9660,
    /// Joliet supplementary tree (UCS-2 names)
    Joliet,
    /// Universal Disk Format
    Udf,
}

/// Object type, decoded from [`ObjectInfo::mode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Directory
    Directory,
    /// Regular file
    File,
    /// Symbolic link
    Symlink,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// FIFO
    Fifo,
    /// Socket
    Socket,
    /// Deleted entry
    Whiteout,
}

impl ObjectType {
    /// Decode from POSIX mode bits
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & mode::S_IFMT {
            mode::S_IFDIR => Some(Self::Directory),
            mode::S_IFREG => Some(Self::File),
            mode::S_IFLNK => Some(Self::Symlink),
            mode::S_IFBLK => Some(Self::BlockDevice),
            mode::S_IFCHR => Some(Self::CharDevice),
            mode::S_IFIFO => Some(Self::Fifo),
            mode::S_IFSOCK => Some(Self::Socket),
            mode::S_IFWHT => Some(Self::Whiteout),
            _ => None,
        }
    }
}

/// Mount options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MountOptions {
    /// Ignore the Joliet supplementary tree
    pub no_joliet: bool,
    /// Ignore Rock Ridge names and attributes
    pub no_rock_ridge: bool,
    /// Ignore UDF, forcing the ISO 9660 trees
    pub no_udf: bool,
    /// Reject a second Primary Volume Descriptor instead of ignoring it
    pub strict_primary: bool,
}

impl MountOptions {
    /// Default options: every extension enabled, lenient primary handling
    pub const fn new() -> Self {
        Self {
            no_joliet: false,
            no_rock_ridge: false,
            no_udf: false,
            strict_primary: false,
        }
    }

    /// Disable Joliet
    pub const fn with_no_joliet(mut self, value: bool) -> Self {
        self.no_joliet = value;
        self
    }

    /// Disable Rock Ridge
    pub const fn with_no_rock_ridge(mut self, value: bool) -> Self {
        self.no_rock_ridge = value;
        self
    }

    /// Disable UDF
    pub const fn with_no_udf(mut self, value: bool) -> Self {
        self.no_udf = value;
        self
    }

    /// Reject duplicate primary volume descriptors
    pub const fn with_strict_primary(mut self, value: bool) -> Self {
        self.strict_primary = value;
        self
    }

    pub(crate) fn joliet_enabled(&self) -> bool {
        cfg!(feature = "joliet") && !self.no_joliet
    }

    pub(crate) fn rock_ridge_enabled(&self) -> bool {
        cfg!(feature = "rock-ridge") && !self.no_rock_ridge
    }
}

/// Flags passed to `Directory::open`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Open for reading
    pub const READ: Self = Self(0x01);
    /// Open for writing
    pub const WRITE: Self = Self(0x02);
    /// Create if missing
    pub const CREATE: Self = Self(0x04);
    /// Truncate on open
    pub const TRUNCATE: Self = Self(0x08);
    /// Append writes
    pub const APPEND: Self = Self(0x10);

    const WRITING: u32 = 0x02 | 0x04 | 0x08 | 0x10;

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the flags ask for any kind of modification
    pub const fn wants_write(self) -> bool {
        self.0 & Self::WRITING != 0
    }
}

impl core::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Seek origin for `File::seek`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// From the start of the file
    Start(u64),
    /// From the current position
    Current(i64),
    /// From the end of the file
    End(i64),
}

/// Metadata of a file, directory or other object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Size in bytes
    pub size: u64,

    /// Bytes allocated on the medium
    pub allocated: u64,

    /// Last access time
    pub access: Timestamp,

    /// Last data modification time
    pub modify: Timestamp,

    /// Last attribute change time
    pub change: Timestamp,

    /// Creation time
    pub birth: Timestamp,

    /// POSIX type and permission bits (see [`mode`])
    pub mode: u32,

    /// Inode number
    pub inode: u64,

    /// ISO 9660 `;n` version (0 when absent)
    pub version: u32,

    /// Hidden / existence flag set
    pub hidden: bool,

    /// Owner (Rock Ridge / UDF only)
    pub uid: u32,

    /// Group (Rock Ridge / UDF only)
    pub gid: u32,

    /// Hard link count
    pub links: u32,

    /// Device number (Rock Ridge `PN`)
    pub device: u64,
}

impl ObjectInfo {
    /// Object type from the mode bits
    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_mode(self.mode)
    }

    /// Is this a directory?
    pub fn is_directory(&self) -> bool {
        self.mode & mode::S_IFMT == mode::S_IFDIR
    }

    /// Is this a regular file?
    pub fn is_file(&self) -> bool {
        self.mode & mode::S_IFMT == mode::S_IFREG
    }

    /// Is this a symbolic link?
    pub fn is_symlink(&self) -> bool {
        self.mode & mode::S_IFMT == mode::S_IFLNK
    }
}

impl Default for ObjectInfo {
    fn default() -> Self {
        Self {
            size: 0,
            allocated: 0,
            access: Timestamp::EPOCH,
            modify: Timestamp::EPOCH,
            change: Timestamp::EPOCH,
            birth: Timestamp::EPOCH,
            mode: 0,
            inode: 0,
            version: 0,
            hidden: false,
            uid: 0,
            gid: 0,
            links: 1,
            device: 0,
        }
    }
}
