//! Checksum calculations for UDF descriptor tags

/// CRC used by descriptor tags (CRC-ITU-T, polynomial 0x1021, zero init)
const TAG_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Calculate the 8-bit tag checksum: sum of the 16 tag bytes, skipping
/// byte 4 (the checksum itself)
pub fn tag_checksum(tag: &[u8]) -> u8 {
    tag.iter()
        .take(16)
        .enumerate()
        .filter(|&(i, _)| i != 4)
        .fold(0u8, |sum, (_, &b)| sum.wrapping_add(b))
}

/// Calculate the descriptor CRC over `data`
pub fn tag_crc(data: &[u8]) -> u16 {
    TAG_CRC.checksum(data)
}
