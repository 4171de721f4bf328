//! P4K container index.
//!
//! Parsing works directly on the archive's [`ByteView`]: only the trailer and
//! the central directory are touched when opening, entry data is decoded on
//! demand.

use std::path::Path;
use std::sync::Arc;

use memchr::memmem;
use p4kit_common::{path, BinaryReader};

use crate::crypto::{self, CipherKey};
use crate::decompress;
use crate::error::FormatError;
use crate::reader::EntryReader;
use crate::source::ByteView;
use crate::zip::central_dir::extra_field;
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, Eocd64Locator, Eocd64Record, EocdRecord,
    LocalFileHeader, SATURATED_U16, SATURATED_U32,
};
use crate::{Error, P4kEntry, Result};

/// How far before the EOCD to look for a ZIP64 locator when it is not
/// directly adjacent.
const LOCATOR_SCAN: usize = 100;

/// Options applied when opening an archive and reading its entries.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Key for encrypted entries.
    pub key: CipherKey,
    /// Compare each local header with its central directory record and log
    /// disagreements.
    pub verify_local_headers: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            key: CipherKey::P4K,
            verify_local_headers: true,
        }
    }
}

/// End of central directory values after ZIP64 resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Total entries declared by the (ZIP64) EOCD.
    pub declared_entries: u64,
    /// Offset of the central directory.
    pub central_dir_offset: u64,
    /// Size of the central directory in bytes.
    pub central_dir_size: u64,
    /// Whether the values came from the ZIP64 EOCD.
    pub is_zip64: bool,
}

/// Result of probing an entry as a nested container.
#[derive(Debug)]
pub enum NestedProbe {
    /// The entry is a readable container.
    Container(P4kArchive),
    /// The entry is not a container (or could not be decoded); the reason is
    /// informational.
    NotContainer(String),
}

impl NestedProbe {
    /// The container, if the probe succeeded.
    pub fn into_container(self) -> Option<P4kArchive> {
        match self {
            Self::Container(archive) => Some(archive),
            Self::NotContainer(_) => None,
        }
    }
}

/// A parsed P4K (or plain ZIP) container.
///
/// Cloning is cheap: the entry list and the byte view are shared.
#[derive(Clone)]
pub struct P4kArchive {
    inner: Arc<ArchiveInner>,
}

struct ArchiveInner {
    name: String,
    view: ByteView,
    options: OpenOptions,
    summary: ArchiveSummary,
    entries: Vec<P4kEntry>,
}

impl P4kArchive {
    /// Memory-map and open an archive file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Memory-map and open an archive file.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let view = ByteView::map_file(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self::from_view(name, view, options)
    }

    /// Open an archive held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, options: OpenOptions) -> Result<Self> {
        Self::from_view(name, ByteView::from_vec(bytes), options)
    }

    /// Open an archive over any byte view. Offsets are relative to the view.
    pub fn from_view(name: impl Into<String>, view: ByteView, options: OpenOptions) -> Result<Self> {
        let (summary, entries) = parse_index(view.as_slice())?;
        Ok(Self {
            inner: Arc::new(ArchiveInner {
                name: name.into(),
                view,
                options,
                summary,
                entries,
            }),
        })
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// EOCD summary.
    #[inline]
    pub fn summary(&self) -> &ArchiveSummary {
        &self.inner.summary
    }

    /// Options the archive was opened with.
    #[inline]
    pub fn options(&self) -> &OpenOptions {
        &self.inner.options
    }

    /// The bytes the archive was parsed from.
    #[inline]
    pub fn view(&self) -> &ByteView {
        &self.inner.view
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.inner.entries.len()
    }

    /// All entries in central directory order.
    #[inline]
    pub fn entries(&self) -> &[P4kEntry] {
        &self.inner.entries
    }

    /// Iterate over entries.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, P4kEntry> {
        self.inner.entries.iter()
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&P4kEntry> {
        self.inner.entries.get(index)
    }

    /// Find an entry by name (case- and separator-insensitive).
    ///
    /// This is a linear scan; use [`P4kFileSystem`](crate::P4kFileSystem)
    /// for repeated lookups.
    pub fn find(&self, name: &str) -> Option<&P4kEntry> {
        self.inner
            .entries
            .iter()
            .find(|e| path::paths_equal(e.name(), name))
    }

    /// The raw (possibly encrypted, compressed) data region of an entry.
    pub fn compressed_data(&self, entry: &P4kEntry) -> Result<ByteView> {
        let view = &self.inner.view;
        let offset = entry.local_header_offset();

        let mut reader = BinaryReader::new(view.read_at(offset, LocalFileHeader::SIZE_WITH_SIGNATURE)?);
        let signature = reader.read_u32()?;
        if !LocalFileHeader::is_signature(signature) {
            return Err(FormatError::InvalidSignature {
                record: "local file header",
                offset,
                expected: LocalFileHeader::SIGNATURE,
                actual: signature,
            }
            .into());
        }
        let header: LocalFileHeader = reader.read_struct()?;

        let name_offset = offset + LocalFileHeader::SIZE_WITH_SIGNATURE as u64;
        if self.inner.options.verify_local_headers {
            let name = view.read_at(name_offset, header.file_name_length as usize)?;
            check_local_header(entry, &header, name);
        }

        let data_offset = name_offset + header.variable_data_size() as u64;
        view.slice(data_offset, entry.compressed_size())
    }

    /// Open a verifying decoder for an entry.
    pub fn open_entry(&self, entry: &P4kEntry) -> Result<EntryReader> {
        let region = self.compressed_data(entry)?;

        let region = if entry.is_encrypted() {
            let mut plain = region.as_slice().to_vec();
            crypto::decrypt_in_place(&self.inner.options.key, &mut plain)?;
            if entry.compression_method() == CompressionMethod::Store {
                plain.truncate(entry.uncompressed_size() as usize);
            }
            ByteView::from_vec(plain)
        } else {
            region
        };

        let inner = decompress::decoder(entry.compression_method(), region.cursor())?;
        Ok(EntryReader::new(entry, inner))
    }

    /// Read entry contents - handles decryption, decompression and
    /// verification.
    pub fn read(&self, entry: &P4kEntry) -> Result<Vec<u8>> {
        self.open_entry(entry)?.read_all()
    }

    /// Read entry by index.
    pub fn read_index(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("entry #{index}")))?;
        self.read(entry)
    }

    /// Parallel extraction of multiple entries; results keep input order.
    #[cfg(feature = "parallel")]
    pub fn read_parallel(&self, entries: &[&P4kEntry]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        entries.par_iter().map(|entry| self.read(entry)).collect()
    }

    /// Try to open an entry as a container of its own.
    ///
    /// Stored, unencrypted entries are opened as a window into this archive's
    /// bytes; anything else is decoded into memory first. Failing to decode or
    /// parse the entry is the common case for arbitrary entries and is
    /// reported as [`NestedProbe::NotContainer`]; only failing to locate the
    /// entry's data in this archive is an error.
    pub fn open_nested(&self, entry: &P4kEntry) -> Result<NestedProbe> {
        let raw = self.compressed_data(entry)?;
        let view = if entry.compression_method() == CompressionMethod::Store && !entry.is_encrypted() {
            Ok(raw)
        } else {
            self.read(entry).map(ByteView::from_vec)
        };

        let opened = view.and_then(|view| {
            let name = format!("{}/{}", self.name(), path::to_display(entry.name()));
            P4kArchive::from_view(name, view, self.inner.options.clone())
        });

        Ok(match opened {
            Ok(archive) => NestedProbe::Container(archive),
            Err(e) => {
                log::debug!("{} is not a nested container: {e}", entry.name());
                NestedProbe::NotContainer(e.to_string())
            }
        })
    }
}

impl std::fmt::Debug for P4kArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P4kArchive")
            .field("name", &self.inner.name)
            .field("entries", &self.inner.entries.len())
            .field("zip64", &self.inner.summary.is_zip64)
            .finish()
    }
}

/// Compare a local header with the central record, logging mismatches.
/// Returns whether both agree.
fn check_local_header(entry: &P4kEntry, header: &LocalFileHeader, raw_name: &[u8]) -> bool {
    let name = String::from_utf8_lossy(raw_name);
    let names_agree = path::paths_equal(&name, entry.name());
    if !names_agree {
        log::warn!(
            "local header name {:?} differs from central directory name {:?}",
            name,
            entry.name()
        );
    }

    let agrees = |local: u32, central: u64| local == SATURATED_U32 || u64::from(local) == central;
    let (compressed, uncompressed) = (header.compressed_size, header.uncompressed_size);
    // Producers that stream entries leave zero sizes in the local header.
    let sizes_omitted = compressed == 0 && uncompressed == 0;
    let sizes_agree = sizes_omitted
        || (agrees(compressed, entry.compressed_size()) && agrees(uncompressed, entry.uncompressed_size()));
    if !sizes_agree {
        log::warn!(
            "{}: local header sizes {}/{} differ from central directory {}/{}",
            entry.name(),
            compressed,
            uncompressed,
            entry.compressed_size(),
            entry.uncompressed_size()
        );
    }

    names_agree && sizes_agree
}

/// Parse the trailer and central directory.
fn parse_index(data: &[u8]) -> Result<(ArchiveSummary, Vec<P4kEntry>)> {
    let eocd_offset = find_eocd(data)?;
    let mut reader = BinaryReader::new(&data[eocd_offset + 4..]);
    let eocd: EocdRecord = reader.read_struct()?;

    let summary = if eocd.requires_zip64() {
        let eocd64 = read_zip64_eocd(data, eocd_offset)?;
        ArchiveSummary {
            declared_entries: eocd64.central_dir_count_total,
            central_dir_offset: eocd64.central_dir_offset,
            central_dir_size: eocd64.central_dir_size,
            is_zip64: true,
        }
    } else {
        ArchiveSummary {
            declared_entries: u64::from(eocd.central_dir_count_total),
            central_dir_offset: u64::from(eocd.central_dir_offset),
            central_dir_size: u64::from(eocd.central_dir_size),
            is_zip64: false,
        }
    };

    let entries = parse_central_directory(data, &summary)?;
    Ok((summary, entries))
}

/// Locate the EOCD record by scanning backward from the end of content.
///
/// Trailing null padding is skipped first; the record must then start within
/// `22 + 65535` bytes of the last content byte.
fn find_eocd(data: &[u8]) -> Result<usize> {
    let content_end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let search_start = content_end.saturating_sub(EocdRecord::MAX_BACKWARD_SCAN);
    let window = &data[search_start..];

    memmem::rfind_iter(window, &EocdRecord::MAGIC)
        .map(|pos| search_start + pos)
        .find(|&pos| {
            let fixed_end = pos + EocdRecord::SIZE_WITH_SIGNATURE;
            if fixed_end > data.len() {
                return false;
            }
            let comment_length = u16::from_le_bytes([data[fixed_end - 2], data[fixed_end - 1]]);
            fixed_end + comment_length as usize <= data.len()
        })
        .ok_or_else(|| FormatError::EocdNotFound.into())
}

fn read_zip64_eocd(data: &[u8], eocd_offset: usize) -> Result<Eocd64Record> {
    let search_start = eocd_offset.saturating_sub(Eocd64Locator::SIZE_WITH_SIGNATURE + LOCATOR_SCAN);
    let locator_offset = memmem::rfind(&data[search_start..eocd_offset], &Eocd64Locator::MAGIC)
        .map(|pos| search_start + pos)
        .ok_or(FormatError::Zip64LocatorNotFound)?;

    let mut reader = BinaryReader::new(&data[locator_offset + 4..]);
    let locator: Eocd64Locator = reader.read_struct()?;

    let offset = locator.zip64_eocd_offset;
    let start = usize::try_from(offset)
        .ok()
        .filter(|&start| start.saturating_add(4) <= data.len())
        .ok_or(FormatError::OutOfBounds {
            what: "ZIP64 end of central directory",
            offset,
            len: 4 + std::mem::size_of::<Eocd64Record>() as u64,
            available: data.len() as u64,
        })?;

    let mut reader = BinaryReader::new(&data[start..]);
    let signature = reader.read_u32()?;
    if signature != Eocd64Record::SIGNATURE {
        return Err(FormatError::InvalidSignature {
            record: "ZIP64 end of central directory",
            offset,
            expected: Eocd64Record::SIGNATURE,
            actual: signature,
        }
        .into());
    }

    Ok(reader.read_struct()?)
}

fn parse_central_directory(data: &[u8], summary: &ArchiveSummary) -> Result<Vec<P4kEntry>> {
    let declared = summary.declared_entries;
    let cd_start = usize::try_from(summary.central_dir_offset)
        .ok()
        .filter(|&start| start <= data.len())
        .ok_or(FormatError::OutOfBounds {
            what: "central directory",
            offset: summary.central_dir_offset,
            len: summary.central_dir_size,
            available: data.len() as u64,
        })?;

    let cd = &data[cd_start..];
    let mut reader = BinaryReader::new(cd);
    // Each header is at least 46 bytes, which bounds what a lying count can
    // make us reserve.
    let mut entries = Vec::with_capacity(declared.min(cd.len() as u64 / 46) as usize);

    for index in 0..declared {
        if reader.peek_u32().ok() != Some(CentralDirectoryHeader::SIGNATURE) {
            return Err(FormatError::EntryCountMismatch {
                declared,
                parsed: index,
            }
            .into());
        }
        entries.push(read_cd_entry(&mut reader, index)?);
    }

    // Headers beyond the declared count, still inside the directory region.
    let region_end = usize::try_from(summary.central_dir_size).map_or(cd.len(), |size| size.min(cd.len()));
    let mut extra = 0u64;
    while reader.position() < region_end && reader.peek_u32().ok() == Some(CentralDirectoryHeader::SIGNATURE) {
        if read_cd_entry(&mut reader, declared + extra).is_err() {
            break;
        }
        extra += 1;
    }
    if extra > 0 {
        return Err(FormatError::EntryCountMismatch {
            declared,
            parsed: declared + extra,
        }
        .into());
    }

    Ok(entries)
}

fn read_cd_entry(reader: &mut BinaryReader, index: u64) -> Result<P4kEntry> {
    reader.advance(4)?;
    let header: CentralDirectoryHeader = reader.read_struct()?;

    let name_bytes = reader.read_bytes(header.file_name_length as usize)?;
    let name = String::from_utf8_lossy(name_bytes).replace('/', "\\");

    let mut fields = EntryFields {
        compressed_size: u64::from(header.compressed_size),
        uncompressed_size: u64::from(header.uncompressed_size),
        local_header_offset: u64::from(header.local_header_offset),
        is_encrypted: false,
        zip64_applied: false,
    };

    let extra = reader.read_bytes(header.extra_field_length as usize)?;
    apply_extra_fields(extra, &header, &mut fields)?;
    if header.needs_zip64() && !fields.zip64_applied {
        return Err(FormatError::MissingZip64Field { index }.into());
    }

    reader.advance(header.file_comment_length as usize)?;

    Ok(P4kEntry::new(
        name,
        fields.compressed_size,
        fields.uncompressed_size,
        CompressionMethod::from(header.compression_method),
        fields.is_encrypted,
        fields.local_header_offset,
        header.last_modified,
        header.crc32,
    ))
}

struct EntryFields {
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    is_encrypted: bool,
    zip64_applied: bool,
}

/// Walk the `(id, length)` records of an extra block.
fn apply_extra_fields(extra: &[u8], header: &CentralDirectoryHeader, fields: &mut EntryFields) -> Result<()> {
    let mut reader = BinaryReader::new(extra);

    while reader.remaining() >= 4 {
        let id = reader.read_u16()?;
        let mut length = reader.read_u16()? as usize;
        if extra_field::length_includes_prefix(id) {
            length = length.saturating_sub(4);
        }
        // Some producers pad the extra block; a truncated trailing record is
        // treated as padding.
        let Ok(mut body) = reader.sub_reader(length) else {
            break;
        };

        match id {
            extra_field::ZIP64 => {
                if header.uncompressed_size == SATURATED_U32 {
                    fields.uncompressed_size = body.read_u64()?;
                }
                if header.compressed_size == SATURATED_U32 {
                    fields.compressed_size = body.read_u64()?;
                }
                if header.local_header_offset == SATURATED_U32 {
                    fields.local_header_offset = body.read_u64()?;
                }
                if header.disk_number_start == SATURATED_U16 {
                    let _disk = body.read_u32()?;
                }
                fields.zip64_applied = true;
            }
            extra_field::P4K_ENCRYPTION => {
                fields.is_encrypted = body.read_u16()? == 1;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{P4kWriteEntry, P4kWriteOptions, P4kWriter};

    fn build(entries: Vec<P4kWriteEntry>, options: P4kWriteOptions) -> Vec<u8> {
        let mut writer = P4kWriter::new(Vec::new(), options);
        for entry in entries {
            writer.add(entry).unwrap();
        }
        writer.finish().unwrap()
    }

    fn sample_entries() -> Vec<P4kWriteEntry> {
        vec![
            P4kWriteEntry::new(r"Data\Libs\Config\defaultProfile.xml", b"<profile/>".to_vec()),
            P4kWriteEntry::new(r"Data\Objects\ship.cgf", vec![0xAB; 4096])
                .with_method(CompressionMethod::Zstd),
            P4kWriteEntry::new(r"Data\Scripts\main.lua", b"print('hi')".repeat(50))
                .with_method(CompressionMethod::Deflate),
            P4kWriteEntry::new(r"Data\Secret\keys.xml", b"<keys/>".to_vec())
                .with_method(CompressionMethod::Zstd)
                .encrypted(true),
        ]
    }

    fn open(bytes: Vec<u8>) -> P4kArchive {
        P4kArchive::from_bytes("test.p4k", bytes, OpenOptions::default()).unwrap()
    }

    #[test]
    fn test_entry_count_matches_declared_total() {
        let archive = open(build(sample_entries(), P4kWriteOptions::default()));

        assert_eq!(archive.entry_count(), 4);
        assert_eq!(archive.summary().declared_entries, 4);
        assert!(!archive.summary().is_zip64);
    }

    #[test]
    fn test_zip64_and_legacy_paths_agree() {
        let legacy = open(build(sample_entries(), P4kWriteOptions::default()));
        let zip64 = open(build(
            sample_entries(),
            P4kWriteOptions {
                force_zip64: true,
                ..Default::default()
            },
        ));

        assert!(zip64.summary().is_zip64);
        assert_eq!(zip64.summary().declared_entries, 4);
        assert_eq!(legacy.entries(), zip64.entries());

        for entry in zip64.iter() {
            assert_eq!(zip64.read(entry).unwrap(), legacy.read(entry).unwrap());
        }
    }

    #[test]
    fn test_read_all_methods() {
        let archive = open(build(sample_entries(), P4kWriteOptions::default()));

        let profile = archive.find("data/libs/config/DEFAULTPROFILE.xml").unwrap();
        assert_eq!(archive.read(profile).unwrap(), b"<profile/>");

        let ship = archive.find("Data/Objects/ship.cgf").unwrap();
        assert_eq!(ship.compression_method(), CompressionMethod::Zstd);
        assert_eq!(archive.read(ship).unwrap(), vec![0xAB; 4096]);

        let script = archive.find(r"Data\Scripts\main.lua").unwrap();
        assert_eq!(archive.read(script).unwrap(), b"print('hi')".repeat(50));

        let secret = archive.find(r"Data\Secret\keys.xml").unwrap();
        assert!(secret.is_encrypted());
        assert_eq!(secret.compressed_size() % 16, 0);
        assert_eq!(archive.read(secret).unwrap(), b"<keys/>");
    }

    #[test]
    fn test_every_read_matches_recorded_size_and_crc() {
        let archive = open(build(sample_entries(), P4kWriteOptions::default()));
        for entry in archive.iter() {
            let data = archive.read(entry).unwrap();
            assert_eq!(data.len() as u64, entry.uncompressed_size());
            assert_eq!(p4kit_common::crc::checksum(&data), entry.crc32());
        }
    }

    #[test]
    fn test_encrypted_store_entry() {
        let archive = open(build(
            vec![P4kWriteEntry::new("a.txt", b"plain text payload".to_vec()).encrypted(true)],
            P4kWriteOptions::default(),
        ));
        let entry = archive.get(0).unwrap();
        assert_eq!(entry.compressed_size(), 32);
        assert_eq!(archive.read(entry).unwrap(), b"plain text payload");
    }

    #[test]
    fn test_corrupt_stored_byte_fails_only_that_entry() {
        let mut bytes = build(
            vec![
                P4kWriteEntry::new(r"a\first.xml", b"first payload".to_vec()),
                P4kWriteEntry::new(r"a\second.xml", b"second payload".to_vec()),
            ],
            P4kWriteOptions::default(),
        );
        let pos = memmem::find(&bytes, b"first payload").unwrap();
        bytes[pos] ^= 0xFF;

        let archive = open(bytes);
        let first = archive.find(r"a\first.xml").unwrap();
        let second = archive.find(r"a\second.xml").unwrap();

        assert!(matches!(archive.read(first), Err(Error::Checksum { .. })));
        assert_eq!(archive.read(second).unwrap(), b"second payload");
    }

    #[test]
    fn test_wrong_recorded_size_is_corrupt_entry() {
        let archive = open(build(
            vec![P4kWriteEntry::new("short.bin", vec![1u8; 64])
                .with_method(CompressionMethod::Zstd)
                .with_recorded_size(32)],
            P4kWriteOptions::default(),
        ));
        let entry = archive.get(0).unwrap();
        assert!(matches!(
            archive.read(entry),
            Err(Error::CorruptEntry { expected: 32, .. })
        ));
    }

    #[test]
    fn test_eocd_found_behind_comment_and_padding() {
        let mut bytes = build(sample_entries(), P4kWriteOptions::default());
        let comment = b"built by test";
        // The writer emits no comment, so the EOCD ends with its length field.
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(comment);
        bytes.extend_from_slice(&[0u8; 4096]);

        let archive = open(bytes);
        assert_eq!(archive.entry_count(), 4);
    }

    #[test]
    fn test_missing_eocd_is_format_error() {
        let result = P4kArchive::from_bytes("junk", vec![0x42; 1024], OpenOptions::default());
        assert!(matches!(result, Err(Error::Format(FormatError::EocdNotFound))));
    }

    #[test]
    fn test_declared_count_too_high_is_mismatch() {
        let mut bytes = build(sample_entries(), P4kWriteOptions::default());
        let eocd = memmem::rfind(&bytes, &EocdRecord::MAGIC).unwrap();
        // central_dir_count_disk and central_dir_count_total
        bytes[eocd + 8..eocd + 10].copy_from_slice(&5u16.to_le_bytes());
        bytes[eocd + 10..eocd + 12].copy_from_slice(&5u16.to_le_bytes());

        let result = P4kArchive::from_bytes("bad", bytes, OpenOptions::default());
        assert!(matches!(
            result,
            Err(Error::Format(FormatError::EntryCountMismatch {
                declared: 5,
                parsed: 4
            }))
        ));
    }

    #[test]
    fn test_declared_count_too_low_is_mismatch() {
        let mut bytes = build(sample_entries(), P4kWriteOptions::default());
        let eocd = memmem::rfind(&bytes, &EocdRecord::MAGIC).unwrap();
        bytes[eocd + 8..eocd + 10].copy_from_slice(&3u16.to_le_bytes());
        bytes[eocd + 10..eocd + 12].copy_from_slice(&3u16.to_le_bytes());

        let result = P4kArchive::from_bytes("bad", bytes, OpenOptions::default());
        assert!(matches!(
            result,
            Err(Error::Format(FormatError::EntryCountMismatch {
                declared: 3,
                parsed: 4
            }))
        ));
    }

    #[test]
    fn test_nested_container_is_zero_copy_window() {
        let inner = build(
            vec![P4kWriteEntry::new(r"inner\level.xml", b"<level/>".to_vec())],
            P4kWriteOptions::default(),
        );
        let outer = open(build(
            vec![
                P4kWriteEntry::new(r"Data\level.socpak", inner),
                P4kWriteEntry::new(r"Data\fake.socpak", b"not a zip at all".to_vec()),
            ],
            P4kWriteOptions::default(),
        ));

        let socpak = outer.find(r"Data\level.socpak").unwrap();
        let nested = outer.open_nested(socpak).unwrap().into_container().unwrap();
        assert!(nested.view().shares_backing(outer.view()));

        let level = nested.find(r"inner\level.xml").unwrap();
        assert_eq!(nested.read(level).unwrap(), b"<level/>");

        let fake = outer.find(r"Data\fake.socpak").unwrap();
        assert!(matches!(outer.open_nested(fake).unwrap(), NestedProbe::NotContainer(_)));
    }

    #[test]
    fn test_compressed_nested_container_is_decoded() {
        let inner = build(
            vec![P4kWriteEntry::new("x.xml", b"<x/>".to_vec())],
            P4kWriteOptions::default(),
        );
        let outer = open(build(
            vec![P4kWriteEntry::new("x.pak", inner).with_method(CompressionMethod::Zstd)],
            P4kWriteOptions::default(),
        ));

        let nested = outer.open_nested(outer.get(0).unwrap()).unwrap().into_container().unwrap();
        assert!(!nested.view().shares_backing(outer.view()));
        assert_eq!(nested.read_index(0).unwrap(), b"<x/>");
    }

    #[test]
    fn test_unknown_method_fails_only_on_read() {
        let archive = open(build(
            vec![
                P4kWriteEntry::new("odd.bin", vec![1, 2, 3]).with_raw_method(14),
                P4kWriteEntry::new("ok.bin", vec![4, 5, 6]),
            ],
            P4kWriteOptions::default(),
        ));
        assert!(matches!(
            archive.read_index(0),
            Err(Error::UnsupportedCompression(14))
        ));
        assert_eq!(archive.read_index(1).unwrap(), vec![4, 5, 6]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_read_parallel_keeps_order() {
        let archive = open(build(sample_entries(), P4kWriteOptions::default()));
        let entries: Vec<&P4kEntry> = archive.iter().collect();
        let results = archive.read_parallel(&entries);

        assert_eq!(results.len(), entries.len());
        for (entry, result) in entries.iter().zip(results) {
            assert_eq!(result.unwrap().len() as u64, entry.uncompressed_size());
        }
    }

    fn central_record(mut header: CentralDirectoryHeader, name: &str, extra: &[u8]) -> Vec<u8> {
        use zerocopy::IntoBytes;

        header.file_name_length = name.len() as u16;
        header.extra_field_length = extra.len() as u16;
        let mut bytes = CentralDirectoryHeader::SIGNATURE.to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(extra);
        bytes
    }

    fn zip64_extra(values: &[u64]) -> Vec<u8> {
        let mut extra = extra_field::ZIP64.to_le_bytes().to_vec();
        extra.extend_from_slice(&((values.len() * 8) as u16).to_le_bytes());
        for value in values {
            extra.extend_from_slice(&value.to_le_bytes());
        }
        extra
    }

    fn zeroed_header() -> CentralDirectoryHeader {
        use zerocopy::FromZeros;
        CentralDirectoryHeader::new_zeroed()
    }

    #[test]
    fn test_zip64_override_of_offset_alone() {
        let mut header = zeroed_header();
        header.compressed_size = 10;
        header.uncompressed_size = 20;
        header.local_header_offset = SATURATED_U32;
        let bytes = central_record(header, "big.bin", &zip64_extra(&[0x1_2345_6789]));

        let entry = read_cd_entry(&mut BinaryReader::new(&bytes), 0).unwrap();
        assert_eq!(entry.compressed_size(), 10);
        assert_eq!(entry.uncompressed_size(), 20);
        assert_eq!(entry.local_header_offset(), 0x1_2345_6789);
    }

    #[test]
    fn test_zip64_override_skips_unsaturated_compressed_size() {
        let mut header = zeroed_header();
        header.compressed_size = 10;
        header.uncompressed_size = SATURATED_U32;
        header.local_header_offset = SATURATED_U32;
        let bytes = central_record(header, "big.bin", &zip64_extra(&[5_000_000_000, 7_000_000_000]));

        let entry = read_cd_entry(&mut BinaryReader::new(&bytes), 0).unwrap();
        assert_eq!(entry.compressed_size(), 10);
        assert_eq!(entry.uncompressed_size(), 5_000_000_000);
        assert_eq!(entry.local_header_offset(), 7_000_000_000);
    }

    #[test]
    fn test_saturated_field_without_zip64_extra_is_error() {
        let mut header = zeroed_header();
        header.local_header_offset = SATURATED_U32;
        let bytes = central_record(header, "big.bin", &[]);

        assert!(matches!(
            read_cd_entry(&mut BinaryReader::new(&bytes), 3),
            Err(Error::Format(FormatError::MissingZip64Field { index: 3 }))
        ));
    }

    #[test]
    fn test_local_header_mismatch_is_tolerated() {
        let original = build(
            vec![P4kWriteEntry::new("a.txt", b"hello".to_vec())],
            P4kWriteOptions::default(),
        );
        let offset = open(original.clone()).get(0).unwrap().local_header_offset() as usize;
        let name_offset = offset + LocalFileHeader::SIZE_WITH_SIGNATURE;

        let mut patched = original.clone();
        patched[name_offset] = b'b';
        // compressed_size
        patched[offset + 18..offset + 22].copy_from_slice(&999u32.to_le_bytes());

        let archive = open(patched.clone());
        let entry = archive.get(0).unwrap();
        assert_eq!(entry.name(), "a.txt");
        assert_eq!(archive.read(entry).unwrap(), b"hello");

        let local = |bytes: &[u8]| -> LocalFileHeader {
            BinaryReader::new(&bytes[offset + 4..]).read_struct().unwrap()
        };
        let name = |bytes: &[u8]| bytes[name_offset..name_offset + 5].to_vec();
        assert!(check_local_header(entry, &local(&original), &name(&original)));
        assert!(!check_local_header(entry, &local(&patched), &name(&patched)));
    }
}
