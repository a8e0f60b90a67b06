//! Byte-level helpers shared by the ISO 9660 and UDF parsers

pub mod checksum;
pub mod datetime;
pub mod string;

/// Read a little-endian u16 at `off`
pub(crate) fn le16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

/// Read a little-endian u32 at `off`
pub(crate) fn le32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Read a little-endian u64 at `off`
pub(crate) fn le64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

/// Read a big-endian u32 at `off`
pub(crate) fn be32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Read a big-endian u16 at `off`
pub(crate) fn be16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

/// Both-endian 32-bit field: (little-endian value, big-endian value)
pub(crate) fn both32(buf: &[u8], off: usize) -> (u32, u32) {
    (le32(buf, off), be32(buf, off + 4))
}

/// Both-endian 16-bit field: (little-endian value, big-endian value)
pub(crate) fn both16(buf: &[u8], off: usize) -> (u16, u16) {
    (le16(buf, off), be16(buf, off + 2))
}
