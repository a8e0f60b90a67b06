//! Supplementary Volume Descriptor (Joliet support)
//!
//! The Supplementary VD enables Joliet extensions for long Unicode filenames.
//! It shares the Primary VD layout; escape sequences at offset 88 select the
//! UCS-2 level.

use super::primary::PrimaryVolumeDescriptor;
use crate::error::{IsoFsError, Result};

/// Joliet level announced by the escape sequences, if any
///
/// `%/@`, `%/C` and `%/E` indicate Joliet Level 1/2/3.
pub fn joliet_level(escape_sequences: &[u8; 32]) -> Option<u8> {
    match &escape_sequences[..3] {
        b"%/@" => Some(1),
        b"%/C" => Some(2),
        b"%/E" => Some(3),
        _ => None,
    }
}

/// Check a Joliet descriptor against the primary it supplements
///
/// Block size, volume set size and sequence number must match. The volume
/// space may be smaller than the primary's but never larger.
pub fn check_against_primary(
    svd: &PrimaryVolumeDescriptor,
    primary: &PrimaryVolumeDescriptor,
) -> Result<()> {
    let mismatch = |reason| IsoFsError::InvalidDescriptor {
        offset: svd.offset,
        reason,
    };
    if svd.block_size()? != primary.block_size()? {
        return Err(mismatch("block size differs from the primary"));
    }
    if svd.set_size()? != primary.set_size()? {
        return Err(mismatch("volume set size differs from the primary"));
    }
    if svd.sequence_number()? != primary.sequence_number()? {
        return Err(mismatch("volume sequence number differs from the primary"));
    }
    if svd.space_size()? > primary.space_size()? {
        return Err(mismatch("volume space larger than the primary"));
    }
    Ok(())
}
