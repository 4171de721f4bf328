//! Compressed copies of single entries.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use p4kit_archive::P4kFileSystem;

use crate::{Error, Result};

/// Compression level for saved entries.
pub const ZSTD_LEVEL: i32 = 3;

/// Stream `reader` into a zstd-compressed file at `path`, creating parent
/// directories. Returns the number of uncompressed bytes written.
pub fn write_zstd<R: Read>(mut reader: R, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = zstd::stream::write::Encoder::new(file, ZSTD_LEVEL)?;
    let written = io::copy(&mut reader, &mut encoder).map_err(p4kit_archive::Error::from_stream)?;
    encoder.finish()?.flush()?;
    Ok(written)
}

/// Save the entry at `name` as `<output_dir>/<file name>.zst`.
pub fn save_entry_zstd(fs: &P4kFileSystem, name: &str, output_dir: &Path) -> Result<u64> {
    let reader = fs.open_read(name)?;
    // Prefer the stored spelling over the one asked for.
    let file_name = fs
        .entry(name)
        .map_or_else(|| p4kit_common::path::file_name(name), |entry| entry.file_name());
    if file_name.is_empty() {
        return Err(Error::Config(format!("no file name in {name:?}")));
    }
    write_zstd(reader, &output_dir.join(format!("{file_name}.zst")))
}
