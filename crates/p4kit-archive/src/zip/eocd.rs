//! End of Central Directory records.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{SATURATED_U16, SATURATED_U32};

/// End of Central Directory Record (without signature).
///
/// Any field holding its sentinel (`0xFFFF` / `0xFFFFFFFF`) defers to the
/// ZIP64 EOCD record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EocdRecord {
    pub disk_number: u16,
    pub central_dir_disk: u16,
    pub central_dir_count_disk: u16,
    pub central_dir_count_total: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    pub comment_length: u16,
}

impl EocdRecord {
    /// EOCD signature bytes (`PK\x05\x06`).
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    /// Size of the fixed record including the signature.
    pub const SIZE_WITH_SIGNATURE: usize = 4 + std::mem::size_of::<Self>();

    /// Furthest distance from the end of the archive the record can start at.
    pub const MAX_BACKWARD_SCAN: usize = Self::SIZE_WITH_SIGNATURE + u16::MAX as usize;

    /// Whether the ZIP64 EOCD must be consulted.
    pub fn requires_zip64(&self) -> bool {
        self.disk_number == SATURATED_U16
            || self.central_dir_disk == SATURATED_U16
            || self.central_dir_count_disk == SATURATED_U16
            || self.central_dir_count_total == SATURATED_U16
            || self.central_dir_size == SATURATED_U32
            || self.central_dir_offset == SATURATED_U32
    }

    /// Record with every field saturated, as written in front of a ZIP64 EOCD.
    pub fn saturated() -> Self {
        Self {
            disk_number: SATURATED_U16,
            central_dir_disk: SATURATED_U16,
            central_dir_count_disk: SATURATED_U16,
            central_dir_count_total: SATURATED_U16,
            central_dir_size: SATURATED_U32,
            central_dir_offset: SATURATED_U32,
            comment_length: 0,
        }
    }
}

/// ZIP64 End of Central Directory Locator (without signature).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Locator {
    pub zip64_eocd_disk: u32,
    /// Absolute offset of the ZIP64 EOCD record.
    pub zip64_eocd_offset: u64,
    pub total_disks: u32,
}

impl Eocd64Locator {
    /// Locator signature bytes (`PK\x06\x07`).
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];

    /// Size of the locator including the signature.
    pub const SIZE_WITH_SIGNATURE: usize = 4 + std::mem::size_of::<Self>();
}

/// ZIP64 End of Central Directory Record (without signature).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Record {
    /// Size of the rest of this record (excludes signature and this field).
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub central_dir_disk: u32,
    pub central_dir_count_disk: u64,
    pub central_dir_count_total: u64,
    pub central_dir_size: u64,
    pub central_dir_offset: u64,
}

impl Eocd64Record {
    /// ZIP64 EOCD signature (`PK\x06\x06`).
    pub const SIGNATURE: u32 = 0x06064b50;

    /// Value of `record_size` for a record without extensible data.
    pub const RECORD_SIZE: u64 = (std::mem::size_of::<Self>() - 8) as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(EocdRecord::SIZE_WITH_SIGNATURE, 22);
        assert_eq!(Eocd64Locator::SIZE_WITH_SIGNATURE, 20);
        assert_eq!(Eocd64Record::RECORD_SIZE, 44);
    }

    #[test]
    fn test_any_saturated_field_requires_zip64() {
        let plain = EocdRecord {
            disk_number: 0,
            central_dir_disk: 0,
            central_dir_count_disk: 3,
            central_dir_count_total: 3,
            central_dir_size: 100,
            central_dir_offset: 200,
            comment_length: 0,
        };
        assert!(!plain.requires_zip64());

        let mut disk = plain;
        disk.disk_number = 0xFFFF;
        assert!(disk.requires_zip64());

        let mut offset = plain;
        offset.central_dir_offset = 0xFFFF_FFFF;
        assert!(offset.requires_zip64());

        assert!(EocdRecord::saturated().requires_zip64());
    }
}
