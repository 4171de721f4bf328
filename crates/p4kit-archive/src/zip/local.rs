//! Local File Header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Local File Header (without signature).
///
/// Precedes each entry's data. P4K producers write the sizes here but the
/// central directory is authoritative; readers only use the name and extra
/// lengths to find where the data starts.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LocalFileHeader {
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
}

impl LocalFileHeader {
    /// Standard signature (`PK\x03\x04`).
    pub const SIGNATURE: u32 = 0x04034b50;

    /// Signature used by P4K producers (`PK\x03\x14`).
    pub const SIGNATURE_P4K: u32 = 0x14034b50;

    /// Size of the fixed part including the signature.
    pub const SIZE_WITH_SIGNATURE: usize = 4 + std::mem::size_of::<Self>();

    /// Whether `signature` opens a local header.
    #[inline]
    pub fn is_signature(signature: u32) -> bool {
        signature == Self::SIGNATURE || signature == Self::SIGNATURE_P4K
    }

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> usize {
        self.file_name_length as usize + self.extra_field_length as usize
    }
}
