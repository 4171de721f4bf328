//! p4kit - P4K archive extraction and analysis library.
//!
//! This crate ties the p4kit crates together and adds the bulk passes used
//! by the command line tool.
//!
//! # Crates
//!
//! - [`p4kit_common`] - Common utilities (binary reading, CRC32, path keys)
//! - [`p4kit_archive`] - P4K archive reading and writing (ZIP64 + AES + Zstd)
//! - [`p4kit_dds`] - Split DDS texture reassembly
//! - [`p4kit_diff`] - Snapshot comparison
//!
//! # Example
//!
//! ```no_run
//! use p4kit::prelude::*;
//!
//! let fs = P4kFileSystem::new(P4kArchive::open("Data.p4k")?);
//! let items = p4kit::extract::collect(fs.archive(), |e| e.name().ends_with(".xml"));
//!
//! let config = ExtractConfig::new("out").with_parallelism(Parallelism::Unbounded);
//! let report = p4kit::extract::extract(&items, &config, &NoDocumentDecoder, &NoProgress)?;
//! println!("{} written, {} failed", report.succeeded, report.failed);
//! # Ok::<(), p4kit::Error>(())
//! ```

mod batch;
mod config;
mod error;

pub mod archive_file;
pub mod external;
pub mod extract;
pub mod textures;

pub use p4kit_archive as archive;
pub use p4kit_common as common;
pub use p4kit_dds as dds;
pub use p4kit_diff as diff;

pub use batch::{BatchReport, Failure, NoProgress, Progress};
pub use config::{ExtractConfig, Overwrite, Parallelism};
pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::external::{DocumentDecoder, NoDocumentDecoder, Passthrough, RasterConverter};
    pub use crate::{BatchReport, ExtractConfig, NoProgress, Overwrite, Parallelism, Progress};
    pub use p4kit_archive::{
        CipherKey, CompressionMethod, NestedProbe, OpenOptions, P4kArchive, P4kEntry, P4kFileSystem,
    };
    pub use p4kit_dds::{merge, ChainLayout, MergeOptions, MipSuffixRule};
    pub use p4kit_diff::{compare, ComparisonNode, ComparisonStatus};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
