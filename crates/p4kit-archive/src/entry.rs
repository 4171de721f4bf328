//! P4K archive entry.

use std::path::PathBuf;
use std::time::SystemTime;

use p4kit_common::path;

use crate::zip::CompressionMethod;

/// An entry (file) within a P4K archive.
///
/// Metadata only, as recorded in the central directory. Use
/// [`P4kArchive::read`](crate::P4kArchive::read) to get the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P4kEntry {
    /// Path within the archive, `\`-separated.
    name: String,
    compressed_size: u64,
    uncompressed_size: u64,
    compression_method: CompressionMethod,
    is_encrypted: bool,
    /// Offset of the local file header within the container's byte view.
    local_header_offset: u64,
    /// DOS date/time of last modification.
    dos_datetime: u32,
    /// CRC-32 of the uncompressed data.
    crc32: u32,
}

impl P4kEntry {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        compressed_size: u64,
        uncompressed_size: u64,
        compression_method: CompressionMethod,
        is_encrypted: bool,
        local_header_offset: u64,
        dos_datetime: u32,
        crc32: u32,
    ) -> Self {
        Self {
            name,
            compressed_size,
            uncompressed_size,
            compression_method,
            is_encrypted,
            local_header_offset,
            dos_datetime,
            crc32,
        }
    }

    /// Get the file name/path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final path component.
    #[inline]
    pub fn file_name(&self) -> &str {
        path::file_name(&self.name)
    }

    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    /// Offset of the local file header.
    #[inline]
    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Raw DOS date/time.
    #[inline]
    pub fn dos_datetime(&self) -> u32 {
        self.dos_datetime
    }

    /// Get the last modification time as a SystemTime.
    ///
    /// Returns None if the DOS datetime is invalid.
    pub fn last_modified(&self) -> Option<SystemTime> {
        dos_datetime_to_system_time(self.dos_datetime)
    }

    /// Relative path for extraction: `/`-separated components, with root
    /// markers and `..` removed.
    pub fn output_path(&self) -> PathBuf {
        path::relative_output_path(&self.name)
    }

    /// Lookup key (`/`-separated, lowercase).
    pub fn key(&self) -> String {
        path::normalize_key(&self.name)
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(idx) if idx > 0 => Some(&file_name[idx + 1..]),
            _ => None,
        }
    }
}

/// Convert DOS date/time format to SystemTime.
///
/// Time: bits 0-4 = seconds/2, 5-10 = minutes, 11-15 = hours.
/// Date: bits 16-20 = day, 21-24 = month, 25-31 = year - 1980.
fn dos_datetime_to_system_time(datetime: u32) -> Option<SystemTime> {
    const DAYS_BEFORE_MONTH: [u64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let year = 1980 + u64::from((datetime >> 25) & 0x7F);
    let month = u64::from((datetime >> 21) & 0x0F);
    let day = u64::from((datetime >> 16) & 0x1F);
    let hour = u64::from((datetime >> 11) & 0x1F);
    let minute = u64::from((datetime >> 5) & 0x3F);
    let second = u64::from(datetime & 0x1F) * 2;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    let leap_days = |y: u64| y / 4 - y / 100 + y / 400;
    let mut days = (year - 1970) * 365 + leap_days(year - 1) - leap_days(1969);
    days += DAYS_BEFORE_MONTH[(month - 1) as usize];
    if month > 2 && is_leap_year(year) {
        days += 1;
    }
    days += day - 1;

    let secs = days * 86_400 + hour * 3_600 + minute * 60 + second;
    std::time::UNIX_EPOCH.checked_add(std::time::Duration::from_secs(secs))
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
