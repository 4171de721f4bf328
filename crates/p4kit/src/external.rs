//! Seams to decoders that live outside this workspace.
//!
//! Document decoding (binary XML), database decoding and raster conversion
//! are done by other tools. Extraction passes only need to know whether a
//! payload is recognized and what to write instead of the raw bytes. The
//! lookups for well-known inputs (database, localization, the archive of a
//! previous release) live here as well.

use std::path::{Path, PathBuf};

use p4kit_archive::P4kFileSystem;
use thiserror::Error;

/// Failure reported by an external decoder or converter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Decoder for structured documents stored in a binary form.
pub trait DocumentDecoder: Sync {
    /// Whether `data` is in the decoder's format.
    fn is_recognized(&self, data: &[u8]) -> bool;

    /// Decode `data` to text.
    fn try_decode(&self, data: &[u8]) -> Result<String, DecodeError>;
}

/// Recognizes nothing; every document is written raw.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocumentDecoder;

impl DocumentDecoder for NoDocumentDecoder {
    fn is_recognized(&self, _data: &[u8]) -> bool {
        false
    }

    fn try_decode(&self, _data: &[u8]) -> Result<String, DecodeError> {
        Err(DecodeError::new("no document decoder configured"))
    }
}

/// A converted texture.
#[derive(Debug, Clone)]
pub struct ConvertedRaster {
    pub data: Vec<u8>,
    /// Replacement file extension, without the dot. `None` keeps the
    /// texture's own extension.
    pub extension: Option<String>,
}

/// Converter from reassembled DDS bytes to another raster format.
pub trait RasterConverter: Sync {
    fn convert(&self, name: &str, dds: Vec<u8>) -> Result<ConvertedRaster, DecodeError>;
}

/// Returns the DDS bytes unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl RasterConverter for Passthrough {
    fn convert(&self, _name: &str, dds: Vec<u8>) -> Result<ConvertedRaster, DecodeError> {
        Ok(ConvertedRaster {
            data: dds,
            extension: None,
        })
    }
}

/// Where the game database may be stored, newest layout first.
pub const DATACORE_PATHS: &[&str] = &[r"Data\Game2.dcb", r"Data\Game.dcb"];

/// English localization strings.
pub const LOCALIZATION_PATH: &str = r"Data\Localization\english\global.ini";

/// First existing entry of [`DATACORE_PATHS`].
pub fn locate_datacore(fs: &P4kFileSystem) -> Option<String> {
    DATACORE_PATHS
        .iter()
        .find(|path| fs.file_exists(path))
        .map(|path| path.to_string())
}

/// [`LOCALIZATION_PATH`] if it exists.
pub fn locate_localization(fs: &P4kFileSystem) -> Option<String> {
    fs.file_exists(LOCALIZATION_PATH)
        .then(|| LOCALIZATION_PATH.to_string())
}

/// Resolve the archive a diff-driven pass compares against.
///
/// `path` may name the archive itself, or a directory holding it: the first
/// `*.p4k` directly inside wins, then the most recently modified `*.p4k`
/// anywhere under its `P4k` subdirectory. Returns `None` when nothing is
/// found, in which case callers process everything.
pub fn locate_previous_archive(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if !path.is_dir() {
        return None;
    }

    let base = glob::Pattern::escape(&path.to_string_lossy());
    let matching = |pattern: String| -> Vec<PathBuf> {
        glob::glob(&pattern)
            .map(|paths| paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect())
            .unwrap_or_default()
    };

    if let Some(first) = matching(format!("{base}/*.p4k")).into_iter().next() {
        return Some(first);
    }
    matching(format!("{base}/P4k/**/*.p4k"))
        .into_iter()
        .max_by_key(|p| p.metadata().and_then(|m| m.modified()).ok())
}
