//! Name decoding and matching
//!
//! One volume uses one encoding for its directory records, picked at mount
//! time. Rock Ridge `NM` names, when present, take precedence over the
//! 8-bit identifier of the same record.

use alloc::string::String;

use crate::utils::string::{decode_ascii, decode_ucs2_be};

/// Longest `;version` suffix we parse, in digits
const MAX_VERSION_DIGITS: usize = 5;

/// How directory record identifiers are encoded on this volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    /// ISO 9660 d-characters, compared ignoring ASCII case
    Ascii,
    /// Joliet UCS-2 big-endian, compared ignoring ASCII case
    Utf16Be,
    /// Primary tree with Rock Ridge `NM` names, compared exactly
    RockRidge,
}

impl NameEncoding {
    /// Bytes per code unit of the raw identifier
    fn unit(self) -> usize {
        match self {
            Self::Utf16Be => 2,
            Self::Ascii | Self::RockRidge => 1,
        }
    }

    fn unit_at(self, raw: &[u8], index: usize) -> Option<u16> {
        match self {
            Self::Utf16Be => raw
                .get(index * 2..index * 2 + 2)
                .map(|u| u16::from_be_bytes([u[0], u[1]])),
            Self::Ascii | Self::RockRidge => raw.get(index).map(|&b| b as u16),
        }
    }
}

/// Identifier split into its base name and `;version` suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitName<'a> {
    /// Name without the version suffix and without a dangling `.`
    pub base: &'a [u8],
    /// Parsed version, `None` when no suffix was recognised
    pub version: Option<u32>,
}

/// Split a raw file identifier into name and version
///
/// The suffix is `;` followed by up to five decimal digits (ASCII, or
/// UTF-16BE digits under Joliet). Anything else leaves the identifier as is.
pub fn split_version(raw: &[u8], encoding: NameEncoding) -> SplitName<'_> {
    let unit = encoding.unit();
    let units = raw.len() / unit;
    let whole = SplitName {
        base: raw,
        version: None,
    };

    let mut digits = 0usize;
    let mut version = 0u32;
    let mut scale = 1u32;
    while digits < units {
        let Some(c) = encoding.unit_at(raw, units - 1 - digits) else {
            return whole;
        };
        match c {
            0x30..=0x39 => {
                if digits == MAX_VERSION_DIGITS {
                    return whole;
                }
                version += (c as u32 - 0x30) * scale;
                scale = scale.saturating_mul(10);
                digits += 1;
            }
            0x3b => {
                let mut end = (units - 1 - digits) * unit;
                // "README.;1" names the file "README"
                if end >= unit && encoding.unit_at(raw, end / unit - 1) == Some(b'.' as u16) {
                    end -= unit;
                }
                return SplitName {
                    base: &raw[..end],
                    version: Some(version),
                };
            }
            _ => return whole,
        }
    }
    whole
}

fn fold(c: char) -> char {
    c.to_ascii_lowercase()
}

/// Compare a query against a decoded-on-the-fly raw identifier
fn equals(query: &str, raw: &[u8], encoding: NameEncoding) -> bool {
    match encoding {
        NameEncoding::Ascii => {
            query.len() == raw.len()
                && query
                    .bytes()
                    .zip(raw.iter())
                    .all(|(a, &b)| a.eq_ignore_ascii_case(&b))
        }
        NameEncoding::Utf16Be => {
            let units = raw
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]));
            let mut decoded = char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER));
            let mut wanted = query.chars();
            loop {
                match (decoded.next(), wanted.next()) {
                    (None, None) => return true,
                    (Some(a), Some(b)) if fold(a) == fold(b) => {}
                    _ => return false,
                }
            }
        }
        NameEncoding::RockRidge => query.as_bytes() == raw,
    }
}

/// Does `query` name the record with identifier `raw`?
///
/// Files match with or without their version suffix; directories never
/// carry one and are compared whole.
pub fn matches(query: &str, raw: &[u8], encoding: NameEncoding, is_directory: bool) -> bool {
    if equals(query, raw, encoding) {
        return true;
    }
    if is_directory || encoding == NameEncoding::RockRidge {
        return false;
    }
    let split = split_version(raw, encoding);
    split.version.is_some() && equals(query, split.base, encoding)
}

/// Decode the display name of a record
pub fn decode(raw: &[u8], encoding: NameEncoding, is_directory: bool) -> String {
    let base = if is_directory || encoding == NameEncoding::RockRidge {
        raw
    } else {
        split_version(raw, encoding).base
    };
    match encoding {
        NameEncoding::Ascii => decode_ascii(base),
        NameEncoding::Utf16Be => decode_ucs2_be(base),
        NameEncoding::RockRidge => String::from_utf8_lossy(base).into_owned(),
    }
}

/// Version number of a file identifier (0 when there is none)
pub fn version_of(raw: &[u8], encoding: NameEncoding) -> u32 {
    split_version(raw, encoding).version.unwrap_or(0)
}
