//! Error types for the archive crate.

use std::io;

use thiserror::Error;

/// Structural problems that make a container unreadable.
#[derive(Debug, Error)]
pub enum FormatError {
    /// No end of central directory record within the scan window.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// The EOCD is saturated but no ZIP64 locator precedes it.
    #[error("ZIP64 end of central directory locator not found")]
    Zip64LocatorNotFound,

    /// A record did not start with its signature.
    #[error("invalid {record} signature at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature {
        record: &'static str,
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// A range reaches past the end of the byte source.
    #[error("{what} out of bounds: offset {offset} + {len} exceeds {available} bytes")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        len: u64,
        available: u64,
    },

    /// A ZIP64 extra field was required but missing or too short.
    #[error("entry {index}: ZIP64 extra field missing or truncated")]
    MissingZip64Field { index: u64 },

    /// The number of central directory headers disagrees with the EOCD.
    #[error("central directory declares {declared} entries but {parsed} headers were found")]
    EntryCountMismatch { declared: u64, parsed: u64 },
}

/// Errors that can occur when working with P4K archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Binary reading error.
    #[error("{0}")]
    Common(#[from] p4kit_common::Error),

    /// The container is structurally invalid.
    #[error("invalid container: {0}")]
    Format(#[from] FormatError),

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Decoded length disagrees with the central directory.
    #[error("{name}: decoded {actual} bytes, central directory records {expected}")]
    CorruptEntry {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Decoded CRC-32 disagrees with the central directory.
    #[error("{name}: CRC-32 {actual:#010x} does not match recorded {expected:#010x}")]
    Checksum {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// No entry matches the path.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry name longer than a ZIP header can record.
    #[error("entry name is {0} bytes, headers hold at most 65535")]
    NameTooLong(usize),
}

impl Error {
    /// Recover a typed error that travelled through an `io::Error`.
    ///
    /// [`EntryReader`](crate::EntryReader) reports validation failures as
    /// `io::ErrorKind::InvalidData` wrapping an [`Error`].
    pub fn from_stream(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io(io::Error::new(kind, other)),
            None => Self::Io(io::Error::from(kind)),
        }
    }

    /// Wrap this error for transport through `std::io::Read`.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// Whether this error describes a single damaged entry, as opposed to
    /// an unreadable container.
    pub fn is_entry_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptEntry { .. }
                | Self::Checksum { .. }
                | Self::Decompression(_)
                | Self::Decryption(_)
                | Self::UnsupportedCompression(_)
        )
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
