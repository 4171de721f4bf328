//! P4K archive writer.
//!
//! Produces containers the reader accepts: P4K local header signatures,
//! encryption flagged through the `0x5002` extra field, and a ZIP64 trailer
//! when sizes or counts need it (or when forced).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use zerocopy::IntoBytes;

use crate::crypto::{self, CipherKey};
use crate::decompress;
use crate::zip::central_dir::extra_field;
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, Eocd64Locator, Eocd64Record, EocdRecord,
    LocalFileHeader, SATURATED_U16, SATURATED_U32,
};
use crate::{Error, Result};

/// 2020-01-01 00:00:00 in DOS date/time format.
pub const DEFAULT_DOS_DATETIME: u32 = (40 << 25) | (1 << 21) | (1 << 16);

const VERSION_LEGACY: u16 = 20;
const VERSION_ZIP64: u16 = 45;

/// Options for a [`P4kWriter`].
#[derive(Debug, Clone)]
pub struct P4kWriteOptions {
    /// Key used for entries marked encrypted.
    pub key: CipherKey,
    /// Write ZIP64 records even when legacy fields would suffice.
    pub force_zip64: bool,
    /// Emit the `0x5000`/`0x5002`/`0x5003` extra fields on every entry.
    /// Encrypted entries always carry `0x5002`.
    pub p4k_extra_fields: bool,
}

impl Default for P4kWriteOptions {
    fn default() -> Self {
        Self {
            key: CipherKey::P4K,
            force_zip64: false,
            p4k_extra_fields: true,
        }
    }
}

/// One entry to be written.
#[derive(Debug, Clone)]
pub struct P4kWriteEntry {
    name: String,
    data: Vec<u8>,
    method: CompressionMethod,
    raw_method: Option<u16>,
    encrypted: bool,
    dos_datetime: u32,
    recorded_crc: Option<u32>,
    recorded_size: Option<u64>,
}

impl P4kWriteEntry {
    /// A stored entry. `/` separators are written as `\`.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into().replace('/', "\\"),
            data,
            method: CompressionMethod::Store,
            raw_method: None,
            encrypted: false,
            dos_datetime: DEFAULT_DOS_DATETIME,
            recorded_crc: None,
            recorded_size: None,
        }
    }

    /// Compress with `method`.
    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.method = method;
        self
    }

    /// Write the bytes as-is but record `id` as the compression method.
    pub fn with_raw_method(mut self, id: u16) -> Self {
        self.raw_method = Some(id);
        self
    }

    /// Encrypt the compressed bytes.
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Last-modified time in DOS format.
    pub fn with_dos_datetime(mut self, dos_datetime: u32) -> Self {
        self.dos_datetime = dos_datetime;
        self
    }

    /// Record `crc` instead of the checksum of the data.
    pub fn with_recorded_crc(mut self, crc: u32) -> Self {
        self.recorded_crc = Some(crc);
        self
    }

    /// Record `size` as the uncompressed size instead of the data length.
    pub fn with_recorded_size(mut self, size: u64) -> Self {
        self.recorded_size = Some(size);
        self
    }

    /// Entry name as it will be written.
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct WrittenEntry {
    name: String,
    name_length: u16,
    method: u16,
    dos_datetime: u32,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    encrypted: bool,
}

impl WrittenEntry {
    fn needs_zip64(&self) -> bool {
        self.compressed_size >= u64::from(SATURATED_U32)
            || self.uncompressed_size >= u64::from(SATURATED_U32)
            || self.local_header_offset >= u64::from(SATURATED_U32)
    }
}

/// Streaming archive writer.
///
/// Entries are written as they are added; the central directory and trailer
/// are written by [`finish`](Self::finish).
pub struct P4kWriter<W: Write> {
    out: W,
    options: P4kWriteOptions,
    offset: u64,
    entries: Vec<WrittenEntry>,
}

impl P4kWriter<BufWriter<File>> {
    /// Create an archive file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, options: P4kWriteOptions) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), options))
    }
}

impl<W: Write> P4kWriter<W> {
    /// Wrap a writer.
    pub fn new(out: W, options: P4kWriteOptions) -> Self {
        Self {
            out,
            options,
            offset: 0,
            entries: Vec::new(),
        }
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry has been written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compress, encrypt and write one entry.
    pub fn add(&mut self, entry: P4kWriteEntry) -> Result<()> {
        let name_length = u16::try_from(entry.name.len()).map_err(|_| Error::NameTooLong(entry.name.len()))?;
        let crc32 = entry
            .recorded_crc
            .unwrap_or_else(|| p4kit_common::crc::checksum(&entry.data));
        let uncompressed_size = entry.recorded_size.unwrap_or(entry.data.len() as u64);

        let (method, mut payload) = match entry.raw_method {
            Some(id) => (id, entry.data),
            None => (entry.method.id(), decompress::compress(entry.method, &entry.data)?),
        };
        if entry.encrypted {
            payload = crypto::encrypt(&self.options.key, payload)?;
        }

        let written = WrittenEntry {
            name: entry.name,
            name_length,
            method,
            dos_datetime: entry.dos_datetime,
            crc32,
            compressed_size: payload.len() as u64,
            uncompressed_size,
            local_header_offset: self.offset,
            encrypted: entry.encrypted,
        };

        let header = LocalFileHeader {
            version_needed: VERSION_LEGACY,
            flags: 0,
            compression_method: written.method,
            last_modified: written.dos_datetime,
            crc32: written.crc32,
            compressed_size: clamp_u32(written.compressed_size),
            uncompressed_size: clamp_u32(written.uncompressed_size),
            file_name_length: written.name_length,
            extra_field_length: 0,
        };

        let signature = if self.options.p4k_extra_fields {
            LocalFileHeader::SIGNATURE_P4K
        } else {
            LocalFileHeader::SIGNATURE
        };
        self.out.write_u32::<LittleEndian>(signature)?;
        self.out.write_all(header.as_bytes())?;
        self.out.write_all(written.name.as_bytes())?;
        self.out.write_all(&payload)?;

        self.offset += (LocalFileHeader::SIZE_WITH_SIGNATURE + written.name.len() + payload.len()) as u64;
        self.entries.push(written);
        Ok(())
    }

    /// Write the central directory and trailer, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.offset;
        let mut cd = Vec::new();
        for entry in &self.entries {
            self.write_cd_header(&mut cd, entry)?;
        }
        self.out.write_all(&cd)?;
        let cd_size = cd.len() as u64;
        let count = self.entries.len() as u64;

        let zip64 = self.options.force_zip64
            || count >= u64::from(SATURATED_U16)
            || cd_size >= u64::from(SATURATED_U32)
            || cd_offset >= u64::from(SATURATED_U32);

        if zip64 {
            let eocd64_offset = cd_offset + cd_size;
            let record = Eocd64Record {
                record_size: Eocd64Record::RECORD_SIZE,
                version_made_by: VERSION_ZIP64,
                version_needed: VERSION_ZIP64,
                disk_number: 0,
                central_dir_disk: 0,
                central_dir_count_disk: count,
                central_dir_count_total: count,
                central_dir_size: cd_size,
                central_dir_offset: cd_offset,
            };
            self.out.write_u32::<LittleEndian>(Eocd64Record::SIGNATURE)?;
            self.out.write_all(record.as_bytes())?;

            let locator = Eocd64Locator {
                zip64_eocd_disk: 0,
                zip64_eocd_offset: eocd64_offset,
                total_disks: 1,
            };
            self.out.write_all(&Eocd64Locator::MAGIC)?;
            self.out.write_all(locator.as_bytes())?;

            self.out.write_all(&EocdRecord::MAGIC)?;
            self.out.write_all(EocdRecord::saturated().as_bytes())?;
        } else {
            let record = EocdRecord {
                disk_number: 0,
                central_dir_disk: 0,
                central_dir_count_disk: count as u16,
                central_dir_count_total: count as u16,
                central_dir_size: cd_size as u32,
                central_dir_offset: cd_offset as u32,
                comment_length: 0,
            };
            self.out.write_all(&EocdRecord::MAGIC)?;
            self.out.write_all(record.as_bytes())?;
        }

        self.out.flush()?;
        Ok(self.out)
    }

    fn write_cd_header(&self, cd: &mut Vec<u8>, entry: &WrittenEntry) -> Result<()> {
        let zip64 = self.options.force_zip64 || entry.needs_zip64();

        let mut extra = Vec::new();
        if zip64 {
            extra.write_u16::<LittleEndian>(extra_field::ZIP64)?;
            extra.write_u16::<LittleEndian>(24)?;
            extra.write_u64::<LittleEndian>(entry.uncompressed_size)?;
            extra.write_u64::<LittleEndian>(entry.compressed_size)?;
            extra.write_u64::<LittleEndian>(entry.local_header_offset)?;
        }
        if self.options.p4k_extra_fields {
            extra.write_u16::<LittleEndian>(extra_field::P4K_5000)?;
            extra.write_u16::<LittleEndian>(8)?;
            extra.write_u32::<LittleEndian>(0)?;
        }
        if self.options.p4k_extra_fields || entry.encrypted {
            extra.write_u16::<LittleEndian>(extra_field::P4K_ENCRYPTION)?;
            extra.write_u16::<LittleEndian>(6)?;
            extra.write_u16::<LittleEndian>(u16::from(entry.encrypted))?;
        }
        if self.options.p4k_extra_fields {
            extra.write_u16::<LittleEndian>(extra_field::P4K_5003)?;
            extra.write_u16::<LittleEndian>(8)?;
            extra.write_u32::<LittleEndian>(0)?;
        }

        let legacy = |value: u64| if zip64 { SATURATED_U32 } else { value as u32 };
        let header = CentralDirectoryHeader {
            version_made_by: if zip64 { VERSION_ZIP64 } else { VERSION_LEGACY },
            version_needed: if zip64 { VERSION_ZIP64 } else { VERSION_LEGACY },
            flags: 0,
            compression_method: entry.method,
            last_modified: entry.dos_datetime,
            crc32: entry.crc32,
            compressed_size: legacy(entry.compressed_size),
            uncompressed_size: legacy(entry.uncompressed_size),
            file_name_length: entry.name_length,
            extra_field_length: extra.len() as u16,
            file_comment_length: 0,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            local_header_offset: legacy(entry.local_header_offset),
        };

        cd.write_u32::<LittleEndian>(CentralDirectoryHeader::SIGNATURE)?;
        cd.extend_from_slice(header.as_bytes());
        cd.extend_from_slice(entry.name.as_bytes());
        cd.extend_from_slice(&extra);
        Ok(())
    }
}

#[inline]
fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(SATURATED_U32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpenOptions, P4kArchive};

    #[test]
    fn test_written_archive_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.p4k");

        let mut writer = P4kWriter::create(&path, P4kWriteOptions::default()).unwrap();
        writer
            .add(P4kWriteEntry::new("Data/one.txt", b"one".to_vec()).with_dos_datetime(0x5A21_6000))
            .unwrap();
        writer
            .add(P4kWriteEntry::new("Data/two.txt", b"two".to_vec()).with_method(CompressionMethod::Deflate))
            .unwrap();
        assert_eq!(writer.len(), 2);
        writer.finish().unwrap();

        let archive = P4kArchive::open(&path).unwrap();
        assert_eq!(archive.entry_count(), 2);

        let one = archive.get(0).unwrap();
        assert_eq!(one.name(), r"Data\one.txt");
        assert_eq!(one.dos_datetime(), 0x5A21_6000);
        assert_eq!(archive.read(one).unwrap(), b"one");
        assert_eq!(archive.read_index(1).unwrap(), b"two");
    }

    #[test]
    fn test_plain_zip_without_p4k_fields() {
        let mut writer = P4kWriter::new(
            Vec::new(),
            P4kWriteOptions {
                p4k_extra_fields: false,
                ..Default::default()
            },
        );
        writer.add(P4kWriteEntry::new("a.txt", b"abc".to_vec())).unwrap();
        let bytes = writer.finish().unwrap();

        assert_eq!(&bytes[..4], &[0x50, 0x4b, 0x03, 0x04]);
        let archive = P4kArchive::from_bytes("plain.zip", bytes, OpenOptions::default()).unwrap();
        assert!(!archive.get(0).unwrap().is_encrypted());
        assert_eq!(archive.read_index(0).unwrap(), b"abc");
    }

    #[test]
    fn test_default_datetime_is_valid() {
        let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
        writer.add(P4kWriteEntry::new("a.txt", Vec::new())).unwrap();
        let archive = P4kArchive::from_bytes("a", writer.finish().unwrap(), OpenOptions::default()).unwrap();
        assert!(archive.get(0).unwrap().last_modified().is_some());
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
        let name = "a".repeat(70_000);
        assert!(matches!(
            writer.add(P4kWriteEntry::new(name, b"x".to_vec())),
            Err(Error::NameTooLong(70_000))
        ));
        assert!(writer.is_empty());

        writer.add(P4kWriteEntry::new("b".repeat(65_535), b"x".to_vec())).unwrap();
        let archive = P4kArchive::from_bytes("long", writer.finish().unwrap(), OpenOptions::default()).unwrap();
        assert_eq!(archive.get(0).unwrap().name().len(), 65_535);
    }
}
