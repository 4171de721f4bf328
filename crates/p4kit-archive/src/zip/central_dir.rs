//! Central Directory File Header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{SATURATED_U16, SATURATED_U32};

/// Central Directory File Header (without signature).
///
/// One per entry. The 32-bit size and offset fields and the 16-bit disk
/// number are overridden by the ZIP64 extra field when saturated.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    /// DOS date/time.
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    /// Offset of the local header, relative to the start of the archive.
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    /// Central Directory signature (`PK\x01\x02`).
    pub const SIGNATURE: u32 = 0x02014b50;

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> usize {
        self.file_name_length as usize
            + self.extra_field_length as usize
            + self.file_comment_length as usize
    }

    /// Whether any field must be read from the ZIP64 extra field.
    pub fn needs_zip64(&self) -> bool {
        self.uncompressed_size == SATURATED_U32
            || self.compressed_size == SATURATED_U32
            || self.local_header_offset == SATURATED_U32
            || self.disk_number_start == SATURATED_U16
    }
}

/// Extra field ids.
///
/// The P4K-specific fields store a length that counts their own 4-byte
/// id/length prefix, unlike standard ZIP extra fields.
pub mod extra_field {
    /// ZIP64 extended information.
    pub const ZIP64: u16 = 0x0001;
    /// P4K field, contents unused.
    pub const P4K_5000: u16 = 0x5000;
    /// P4K encryption flag (`u16`, 1 = encrypted).
    pub const P4K_ENCRYPTION: u16 = 0x5002;
    /// P4K field, contents unused.
    pub const P4K_5003: u16 = 0x5003;

    /// Whether the length of field `id` includes the 4-byte prefix.
    #[inline]
    pub fn length_includes_prefix(id: u16) -> bool {
        matches!(id, P4K_5000 | P4K_ENCRYPTION | P4K_5003)
    }
}
