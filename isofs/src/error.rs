//! Error types for ISO9660 / UDF operations

use core::fmt;

use crate::udf::PartitionMapKind;

/// Result type for filesystem operations
pub type Result<T> = core::result::Result<T, IsoFsError>;

/// Errors that can occur while mounting or reading a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoFsError {
    /// I/O error reading from the backing store (includes short reads)
    IoError {
        /// Byte offset of the failed read
        offset: u64,
    },

    /// First volume descriptor carries no recognised standard identifier
    NotIsoImage,

    /// Volume descriptor sequence is structurally wrong (no primary, no terminator, ...)
    BogusFormat {
        /// What was wrong
        reason: &'static str,
    },

    /// Unsupported descriptor or file structure version
    UnsupportedVersion {
        /// Byte offset of the descriptor
        offset: u64,
        /// Version found on disk
        version: u8,
    },

    /// More volume descriptors than we are willing to scan
    TooManyVolumeDescriptors,

    /// A volume descriptor failed a sanity check
    InvalidDescriptor {
        /// Byte offset of the descriptor
        offset: u64,
        /// What was wrong
        reason: &'static str,
    },

    /// The little- and big-endian copies of a field disagree
    BothEndianMismatch {
        /// Byte offset of the field
        offset: u64,
        /// Little-endian value
        le: u32,
        /// Big-endian value
        be: u32,
    },

    /// Logical block size is not usable
    InvalidBlockSize {
        /// Block size found on disk
        size: u32,
    },

    /// Root directory record is not usable
    InvalidRootDirectory {
        /// Byte offset of the root record
        offset: u64,
        /// What was wrong
        reason: &'static str,
    },

    /// Corrupted directory record or file identifier descriptor
    InvalidDirectoryRecord {
        /// Byte offset (on disk, or within the directory for UDF)
        offset: u64,
        /// What was wrong
        reason: &'static str,
    },

    /// UDF descriptor tag checksum does not match
    TagChecksumMismatch {
        /// Byte offset of the tag
        offset: u64,
        /// Checksum stored in the tag
        expected: u8,
        /// Checksum computed over the tag
        actual: u8,
    },

    /// UDF descriptor CRC does not match
    TagCrcMismatch {
        /// Byte offset of the tag
        offset: u64,
        /// CRC stored in the tag
        expected: u16,
        /// CRC computed over the descriptor body
        actual: u16,
    },

    /// UDF descriptor has an unexpected tag identifier
    TagIdMismatch {
        /// Byte offset of the tag
        offset: u64,
        /// Identifier we wanted
        expected: u16,
        /// Identifier found
        actual: u16,
    },

    /// UDF descriptor tag location does not match where it was read from
    TagLocationMismatch {
        /// Byte offset of the tag
        offset: u64,
        /// Location we read from
        expected: u32,
        /// Location recorded in the tag
        actual: u32,
    },

    /// Unexpected descriptor kind inside a UDF sequence
    UnexpectedTag {
        /// Byte offset of the tag
        offset: u64,
        /// Tag identifier found
        tag: u16,
    },

    /// No usable Anchor Volume Descriptor Pointer
    NoAnchorPointer,

    /// UDF volume descriptor sequence is not usable
    InvalidUdfVolume {
        /// What was wrong
        reason: &'static str,
    },

    /// Logical volume character set is not OSTA compressed unicode
    UnsupportedCharset,

    /// Partition map kind recognised but not supported for I/O
    UnsupportedPartitionMap {
        /// The rejected kind
        kind: PartitionMapKind,
    },

    /// Partition map refers to a partition descriptor that does not exist
    PartitionNotFound {
        /// Partition number
        number: u16,
    },

    /// Partition reference number out of range
    PartitionOutOfRange {
        /// The bad index
        index: u32,
    },

    /// ICB allocation descriptor is smaller than an ICB header
    IcbTooSmall {
        /// Length found
        length: u32,
    },

    /// ICB allocation descriptor is larger than we accept
    IcbTooBig {
        /// Length found
        length: u32,
    },

    /// Nested indirect entries exceed the depth limit
    IcbTooDeep,

    /// Indirect entries exceed the total indirection limit
    TooManyIndirections,

    /// ICB contains an entry kind we do not handle
    UnsupportedIcbType {
        /// Tag identifier found
        tag: u16,
    },

    /// ICB contained no file entry
    NoDirectIcbEntries,

    /// Known UDF file type that this driver cannot represent
    UnsupportedFileType {
        /// ICB file type
        file_type: u8,
    },

    /// Unknown UDF file type
    UnknownFileType {
        /// ICB file type
        file_type: u8,
    },

    /// Allocation descriptors are malformed
    InvalidAllocation {
        /// What was wrong
        reason: &'static str,
    },

    /// Directory exceeds the maximum supported size
    DirectoryTooBig {
        /// Directory size in bytes
        size: u64,
    },

    /// Allocation failed
    OutOfMemory,

    /// File or directory not found
    NotFound,

    /// Path component is not a directory
    NotADirectory,

    /// Expected a file but found a directory
    IsADirectory,

    /// Object type cannot be opened for this operation
    UnsupportedObjectType,

    /// Path has too many components
    PathTooLong,

    /// A name or symlink target exceeds the supported length
    NameTooLong,

    /// Invalid path format
    InvalidPath,

    /// Caller buffer is too small; retry with at least `required` bytes
    BufferTooSmall {
        /// Bytes needed
        required: usize,
    },

    /// Seek would move before the start of the file
    InvalidSeek,

    /// The medium is read-only
    WriteProtected,

    /// Internal error (should not occur)
    InternalError,
}

impl fmt::Display for IsoFsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError { offset } => write!(f, "I/O error reading at offset {offset:#x}"),
            Self::NotIsoImage => write!(f, "Not an ISO9660 or UDF image"),
            Self::BogusFormat { reason } => write!(f, "Bogus volume descriptor sequence: {reason}"),
            Self::UnsupportedVersion { offset, version } => {
                write!(f, "Unsupported version {version} at offset {offset:#x}")
            }
            Self::TooManyVolumeDescriptors => write!(f, "Too many volume descriptors"),
            Self::InvalidDescriptor { offset, reason } => {
                write!(f, "Invalid descriptor at offset {offset:#x}: {reason}")
            }
            Self::BothEndianMismatch { offset, le, be } => write!(
                f,
                "Both-endian mismatch at offset {offset:#x}: LE {le:#x} vs BE {be:#x}"
            ),
            Self::InvalidBlockSize { size } => write!(f, "Invalid logical block size {size}"),
            Self::InvalidRootDirectory { offset, reason } => {
                write!(f, "Invalid root directory record at {offset:#x}: {reason}")
            }
            Self::InvalidDirectoryRecord { offset, reason } => {
                write!(f, "Corrupted directory record at {offset:#x}: {reason}")
            }
            Self::TagChecksumMismatch { offset, expected, actual } => write!(
                f,
                "Descriptor tag checksum mismatch at {offset:#x}: stored {expected:#04x}, computed {actual:#04x}"
            ),
            Self::TagCrcMismatch { offset, expected, actual } => write!(
                f,
                "Descriptor CRC mismatch at {offset:#x}: stored {expected:#06x}, computed {actual:#06x}"
            ),
            Self::TagIdMismatch { offset, expected, actual } => write!(
                f,
                "Descriptor tag id mismatch at {offset:#x}: expected {expected}, found {actual}"
            ),
            Self::TagLocationMismatch { offset, expected, actual } => write!(
                f,
                "Descriptor tag location mismatch at {offset:#x}: expected {expected}, found {actual}"
            ),
            Self::UnexpectedTag { offset, tag } => {
                write!(f, "Unexpected descriptor tag {tag} at {offset:#x}")
            }
            Self::NoAnchorPointer => write!(f, "No valid UDF anchor volume descriptor pointer"),
            Self::InvalidUdfVolume { reason } => write!(f, "Invalid UDF volume: {reason}"),
            Self::UnsupportedCharset => write!(f, "Unsupported UDF logical volume character set"),
            Self::UnsupportedPartitionMap { kind } => {
                write!(f, "Unsupported UDF partition map kind {kind:?}")
            }
            Self::PartitionNotFound { number } => {
                write!(f, "No partition descriptor for partition {number}")
            }
            Self::PartitionOutOfRange { index } => {
                write!(f, "Partition reference {index} out of range")
            }
            Self::IcbTooSmall { length } => write!(f, "ICB too small ({length} bytes)"),
            Self::IcbTooBig { length } => write!(f, "ICB too big ({length} bytes)"),
            Self::IcbTooDeep => write!(f, "ICB indirect entries nested too deep"),
            Self::TooManyIndirections => write!(f, "Too many ICB indirect entries"),
            Self::UnsupportedIcbType { tag } => write!(f, "Unsupported ICB entry type {tag}"),
            Self::NoDirectIcbEntries => write!(f, "No direct ICB entries found"),
            Self::UnsupportedFileType { file_type } => {
                write!(f, "Unsupported UDF file type {file_type:#x}")
            }
            Self::UnknownFileType { file_type } => write!(f, "Unknown UDF file type {file_type:#x}"),
            Self::InvalidAllocation { reason } => {
                write!(f, "Invalid allocation descriptors: {reason}")
            }
            Self::DirectoryTooBig { size } => write!(f, "Directory too big ({size} bytes)"),
            Self::OutOfMemory => write!(f, "Out of memory"),
            Self::NotFound => write!(f, "File or directory not found"),
            Self::NotADirectory => write!(f, "Not a directory"),
            Self::IsADirectory => write!(f, "Is a directory"),
            Self::UnsupportedObjectType => write!(f, "Unsupported object type for this operation"),
            Self::PathTooLong => write!(f, "Path exceeds maximum length"),
            Self::NameTooLong => write!(f, "Name or link target exceeds maximum length"),
            Self::InvalidPath => write!(f, "Invalid path format"),
            Self::BufferTooSmall { required } => {
                write!(f, "Buffer too small, {required} bytes required")
            }
            Self::InvalidSeek => write!(f, "Seek before start of file"),
            Self::WriteProtected => write!(f, "Read-only medium"),
            Self::InternalError => write!(f, "Internal error"),
        }
    }
}

impl From<alloc::collections::TryReserveError> for IsoFsError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
