//! DDS texture reassembly.
//!
//! Large textures are split into multiple archive entries for streaming:
//! - `texture.dds` - The base file with header and small mipmaps
//! - `texture.dds.1` ... `texture.dds.N` - Larger mipmaps, the highest
//!   suffix holding the full-size image
//!
//! This crate finds the siblings of a base texture, either through a
//! [`P4kFileSystem`](p4kit_archive::P4kFileSystem) or next to an extracted
//! file on disk, and joins them back into one file.
//!
//! # Example
//!
//! ```no_run
//! use p4kit_archive::{P4kArchive, P4kFileSystem};
//! use p4kit_dds::merge;
//!
//! let fs = P4kFileSystem::new(P4kArchive::open("Data.p4k")?);
//! let merged = merge("Data/Textures/rock_diff.dds", &fs)?;
//! std::fs::write("rock_diff.dds", &merged.data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod header;
mod merge;
mod suffix;

pub use error::{Error, Result};
pub use header::{block_size, mipmap_size, DdsHeader, DdsHeaderDxt10, DdsInfo, DdsPixelFormat, FourCC};
pub use merge::{
    merge, merge_files, merge_strict, merge_with, ChainLayout, MergeOptions, MergeWarning, MergedTexture, MAX_MIP_INDEX,
};
pub use suffix::{is_mip_sibling, MipSuffixRule, SuffixMatch};

/// DDS file magic bytes ("DDS ").
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
