//! P4K archive reader and writer.
//!
//! The P4K format is a customized ZIP64 archive format used to package game
//! assets. On top of plain ZIP it has:
//!
//! - ZIP64 extended format for large archives (>4GB)
//! - AES-128-CBC encryption for protected entries, flagged by extra field 0x5002
//! - Zstandard compression (method 100) next to DEFLATE (method 8)
//! - Custom extra fields (0x5000, 0x5002, 0x5003) whose length counts their
//!   own header
//! - A `PK\x03\x14` local header signature
//!
//! Archives are memory-mapped and only the central directory is parsed up
//! front. Entries are decoded on demand through an [`EntryReader`], which
//! checks the decoded length and CRC-32 against the central directory.
//! Containers stored inside containers are opened as windows into the
//! parent's bytes.
//!
//! # Example
//!
//! ```no_run
//! use p4kit_archive::{P4kArchive, P4kFileSystem};
//!
//! let archive = P4kArchive::open("Data.p4k")?;
//!
//! for entry in archive.iter().take(10) {
//!     println!("{}: {} bytes", entry.name(), entry.uncompressed_size());
//! }
//!
//! let fs = P4kFileSystem::new(archive);
//! let xml = fs.read("data/libs/foundry/records/ships.xml")?;
//! # Ok::<(), p4kit_archive::Error>(())
//! ```

mod archive;
mod crypto;
mod decompress;
mod entry;
mod error;
mod fs;
mod reader;
mod source;
pub mod writer;
pub mod zip;

pub use archive::{ArchiveSummary, NestedProbe, OpenOptions, P4kArchive};
pub use crypto::CipherKey;
pub use entry::P4kEntry;
pub use error::{Error, FormatError, Result};
pub use fs::{DirEntry, P4kFileSystem};
pub use reader::EntryReader;
pub use source::{Backing, ByteView, ViewCursor};
pub use writer::{P4kWriteEntry, P4kWriteOptions, P4kWriter};
pub use zip::CompressionMethod;
