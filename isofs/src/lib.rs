//! Read-only ISO 9660 / Joliet / Rock Ridge / UDF filesystem
//!
//! A `no_std` (+ `alloc`) driver for optical disc images. It mounts one of
//! the directory trees recorded on an image and exposes it as directories and
//! files with POSIX-style metadata.
//!
//! # Overview
//!
//! - Volume descriptor scan from sector 16 (ISO 9660 descriptors and the UDF
//!   volume recognition sequence)
//! - Tree selection: UDF, then Joliet, then the primary tree with Rock Ridge
//! - Directory lookup and listing with per-encoding name rules
//! - File reads over extent lists (ISO multi-extent, UDF allocation
//!   descriptors, embedded data, holes)
//! - Shared objects: one open on-disk entry has exactly one shared object,
//!   however many handles point at it
//!
//! # Architecture
//!
//! 1. **Store layer** - [`ByteStore`], positioned reads from the image
//! 2. **Volume layer** - descriptor scan and mount ([`volume`], [`udf`])
//! 3. **Directory layer** - record decoding, names, lookup ([`directory`])
//! 4. **File layer** - extent mapping and reads ([`file`])
//!
//! # Usage
//!
//! ```ignore
//! use isofs::{MountOptions, Node, Volume};
//!
//! let volume = Volume::open(image_bytes, MountOptions::new())?;
//! if let Node::File(mut file) = volume.open_path("/boot/vmlinuz")? {
//!     let kernel = file.read_to_vec()?;
//! }
//! ```
//!
//! Block devices from the `gpt_disk_io` stack mount through [`BlockDevice`]:
//!
//! ```ignore
//! let device = isofs::BlockDevice::new(block_io, start_lba)?;
//! let volume = isofs::open(device, isofs::MountOptions::new())?;
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

pub mod directory;
pub mod error;
pub mod extensions;
pub mod file;
mod object;
pub mod store;
pub mod types;
pub mod udf;
pub mod utils;
pub mod volume;

pub use directory::{DirEntry, Directory, Node};
pub use error::{IsoFsError, Result};
pub use file::File;
pub use store::{BlockDevice, ByteStore};
pub use types::{MountOptions, ObjectInfo, ObjectType, OpenFlags, SeekFrom, VolumeType};
pub use volume::{open, IsoVolumeInfo, Volume};
