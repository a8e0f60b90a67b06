//! String handling utilities
//!
//! ISO9660 uses 8-bit a-/d-characters, Joliet uses UCS-2 big-endian, and UDF
//! uses OSTA compressed unicode (CS0). Everything is decoded to UTF-8.

use alloc::string::String;

/// Trim trailing spaces from byte slice
pub fn trim_trailing_spaces(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b' ' || bytes[end - 1] == 0) {
        end -= 1;
    }
    &bytes[..end]
}

/// Decode an 8-bit ISO9660 identifier (a- or d-characters), dropping padding
pub fn decode_ascii(bytes: &[u8]) -> String {
    let trimmed = trim_trailing_spaces(bytes);
    match core::str::from_utf8(trimmed) {
        Ok(s) => String::from(s),
        Err(_) => trimmed.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Decode UCS-2 / UTF-16 big-endian, stopping at a NUL unit
pub fn decode_ucs2_be(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode a Joliet identifier field, dropping trailing space padding
pub fn decode_joliet_label(bytes: &[u8]) -> String {
    let mut s = decode_ucs2_be(bytes);
    let kept = s.trim_end_matches(' ').len();
    s.truncate(kept);
    s
}

/// Decode OSTA compressed unicode: a compression id byte followed by either
/// 8-bit or big-endian 16-bit code units.
pub fn decode_osta_cs0(bytes: &[u8]) -> String {
    let Some((&comp_id, rest)) = bytes.split_first() else {
        return String::new();
    };
    match comp_id {
        8 | 254 => rest.iter().map(|&b| char::from(b)).collect(),
        16 | 255 => decode_ucs2_be(rest),
        _ => String::new(),
    }
}

/// Decode a fixed-size UDF dstring field, whose last byte holds the used length
pub fn decode_dstring(field: &[u8]) -> String {
    let Some((&len, body)) = field.split_last() else {
        return String::new();
    };
    let len = (len as usize).min(body.len());
    if len == 0 {
        return String::new();
    }
    decode_osta_cs0(&body[..len])
}
