//! Allocation descriptors (ECMA-167 4/14.14)

use crate::utils::{le16, le32};

/// Extent kind, stored in the two top bits of the length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdKind {
    /// Recorded and allocated
    Recorded,
    /// Allocated but not recorded (reads as zeros)
    AllocatedOnly,
    /// Neither allocated nor recorded (reads as zeros)
    Free,
    /// Points at the next Allocation Extent Descriptor
    Next,
}

impl AdKind {
    fn from_length(raw: u32) -> Self {
        match raw >> 30 {
            0 => Self::Recorded,
            1 => Self::AllocatedOnly,
            2 => Self::Free,
            _ => Self::Next,
        }
    }
}

const LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Long allocation descriptor: length plus a block in a logical partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LongAd {
    /// Raw length field, kind bits included
    pub length: u32,
    /// Logical block number
    pub block: u32,
    /// Partition reference number
    pub partition: u16,
}

impl LongAd {
    /// Size on disk
    pub const SIZE: usize = 16;

    /// Decode from the first 16 bytes of `buf`
    pub fn parse(buf: &[u8]) -> Self {
        Self {
            length: le32(buf, 0),
            block: le32(buf, 4),
            partition: le16(buf, 8),
        }
    }

    /// Extent length in bytes
    pub fn extent_length(&self) -> u32 {
        self.length & LENGTH_MASK
    }

    /// Extent kind
    pub fn kind(&self) -> AdKind {
        AdKind::from_length(self.length)
    }

    /// All fields zero
    pub fn is_zero(&self) -> bool {
        self.length == 0 && self.block == 0 && self.partition == 0
    }
}

/// Allocation descriptor form, selected by the low three ICB flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdForm {
    /// `short_ad`, 8 bytes, partition implied by the ICB
    Short,
    /// `long_ad`, 16 bytes
    Long,
    /// `ext_ad`, 20 bytes
    Extended,
    /// Data is embedded in the ICB itself
    Embedded,
}

impl AdForm {
    /// Decode from ICB flags; `None` for the reserved values 4..=7
    pub fn from_icb_flags(flags: u16) -> Option<Self> {
        match flags & 0x7 {
            0 => Some(Self::Short),
            1 => Some(Self::Long),
            2 => Some(Self::Extended),
            3 => Some(Self::Embedded),
            _ => None,
        }
    }

    /// Size of one descriptor in bytes (0 for embedded data)
    pub fn size(self) -> usize {
        match self {
            Self::Short => 8,
            Self::Long => LongAd::SIZE,
            Self::Extended => 20,
            Self::Embedded => 0,
        }
    }

    /// Decode one descriptor of this form from `buf`.
    /// Short descriptors inherit `partition` from the owning ICB.
    pub fn decode(self, buf: &[u8], partition: u16) -> AllocationDescriptor {
        let (raw, block, partition) = match self {
            Self::Short => (le32(buf, 0), le32(buf, 4), partition),
            Self::Long => {
                let ad = LongAd::parse(buf);
                (ad.length, ad.block, ad.partition)
            }
            // extent length, recorded length, information length, lb_addr
            Self::Extended => (le32(buf, 0), le32(buf, 12), le16(buf, 16)),
            Self::Embedded => (0, 0, partition),
        };
        AllocationDescriptor {
            length: raw & LENGTH_MASK,
            kind: AdKind::from_length(raw),
            block,
            partition,
        }
    }
}

/// A decoded allocation descriptor of any form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationDescriptor {
    /// Extent length in bytes
    pub length: u32,
    /// Extent kind
    pub kind: AdKind,
    /// Logical block number
    pub block: u32,
    /// Partition reference number
    pub partition: u16,
}
