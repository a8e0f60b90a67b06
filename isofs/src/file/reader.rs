//! File reader implementation
//!
//! Maps a logical byte range of an object onto its extent list and reads
//! the pieces from the backing store. Holes read as zeros.

use crate::error::Result;
use crate::file::extent::ExtentList;
use crate::store::ByteStore;

/// Read up to `buf.len()` bytes at logical `offset` of an object of `size`
/// bytes. Returns the number of bytes produced; 0 at or past the end.
pub fn read_extents(
    store: &dyn ByteStore,
    extents: &ExtentList,
    size: u64,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    if offset >= size || buf.is_empty() {
        return Ok(0);
    }
    let wanted = (size - offset).min(buf.len() as u64) as usize;
    let buf = &mut buf[..wanted];

    let mut extent_start = 0u64;
    let mut done = 0usize;
    for extent in extents.iter() {
        if done == wanted {
            break;
        }
        let extent_end = extent_start + extent.length;
        let pos = offset + done as u64;
        if pos >= extent_end {
            extent_start = extent_end;
            continue;
        }

        let within = pos - extent_start;
        let n = ((extent.length - within) as usize).min(wanted - done);
        let dst = &mut buf[done..done + n];
        if extent.is_hole() {
            dst.fill(0);
        } else {
            store.read_at(extent.offset + within, dst)?;
        }
        done += n;
        extent_start = extent_end;
    }

    // Extents shorter than the recorded size read as zeros
    buf[done..].fill(0);
    Ok(wanted)
}
