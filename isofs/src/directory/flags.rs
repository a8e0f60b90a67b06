//! File flags of an ISO 9660 directory record

/// File flags (ECMA-119 9.1.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileFlags {
    /// Existence bit: hide from listings
    pub hidden: bool,
    /// Directory
    pub directory: bool,
    /// Associated file
    pub associated: bool,
    /// Record format in extended attributes
    pub extended_format: bool,
    /// Permissions in extended attributes
    pub extended_permissions: bool,
    /// Not the final record of a multi-extent file
    pub not_final: bool,
}

impl FileFlags {
    /// Parse from raw byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            hidden: byte & 0x01 != 0,
            directory: byte & 0x02 != 0,
            associated: byte & 0x04 != 0,
            extended_format: byte & 0x08 != 0,
            extended_permissions: byte & 0x10 != 0,
            not_final: byte & 0x80 != 0,
        }
    }

    /// Convert to raw byte
    pub fn to_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.hidden {
            byte |= 0x01;
        }
        if self.directory {
            byte |= 0x02;
        }
        if self.associated {
            byte |= 0x04;
        }
        if self.extended_format {
            byte |= 0x08;
        }
        if self.extended_permissions {
            byte |= 0x10;
        }
        if self.not_final {
            byte |= 0x80;
        }
        byte
    }
}
