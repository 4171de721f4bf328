//! Bulk extraction of archive entries to disk.

use std::fs;
use std::path::{Path, PathBuf};

use p4kit_archive::{NestedProbe, P4kArchive, P4kEntry};

use crate::batch::{self, BatchReport, Outcome, Progress};
use crate::config::{ExtractConfig, Overwrite};
use crate::external::DocumentDecoder;
use crate::{Error, Result};

/// Extensions of entries that may hold nested containers.
pub const NESTED_CONTAINER_EXTENSIONS: &[&str] = &["socpak", "pak"];

/// File name prefix of containers never swept for nested entries.
const SKIPPED_CONTAINER_PREFIX: &str = "shadercache_";

/// One entry to write, with the archive it belongs to.
#[derive(Debug, Clone)]
pub struct ExtractItem {
    pub archive: P4kArchive,
    pub entry: P4kEntry,
    /// Output path relative to the configured output directory.
    pub relative_path: PathBuf,
}

impl ExtractItem {
    /// An entry written at its own path.
    pub fn new(archive: &P4kArchive, entry: &P4kEntry) -> Self {
        Self {
            archive: archive.clone(),
            entry: entry.clone(),
            relative_path: entry.output_path(),
        }
    }

    /// Display name for logs and failure reports.
    pub fn display_name(&self) -> String {
        self.relative_path.to_string_lossy().replace('\\', "/")
    }
}

/// Items for every entry of `archive` accepted by `filter`.
pub fn collect<F>(archive: &P4kArchive, mut filter: F) -> Vec<ExtractItem>
where
    F: FnMut(&P4kEntry) -> bool,
{
    archive
        .iter()
        .filter(|entry| !entry.is_dir() && filter(entry))
        .map(|entry| ExtractItem::new(archive, entry))
        .collect()
}

/// Like [`collect`], and additionally sweeps every `.socpak`/`.pak` entry that
/// opens as a container. Entries found inside a container are written under
/// `<container directory>/<container stem>/<entry path>`, so the container
/// itself can be extracted next to them. Entries that are not containers, or
/// that cannot be read, are skipped.
pub fn collect_nested<F>(archive: &P4kArchive, mut filter: F) -> Vec<ExtractItem>
where
    F: FnMut(&P4kEntry) -> bool,
{
    let mut items = collect(archive, &mut filter);

    let containers = archive.iter().filter(|entry| is_nested_candidate(entry));
    for container in containers {
        let nested = match archive.open_nested(container) {
            Ok(NestedProbe::Container(nested)) => nested,
            Ok(NestedProbe::NotContainer(_)) => continue,
            Err(e) => {
                log::warn!("{}: skipping unreadable container: {e}", container.name());
                continue;
            }
        };

        let prefix = container.output_path().with_extension("");
        let before = items.len();
        items.extend(
            nested
                .iter()
                .filter(|entry| !entry.is_dir() && filter(entry))
                .map(|entry| ExtractItem {
                    archive: nested.clone(),
                    entry: entry.clone(),
                    relative_path: prefix.join(entry.output_path()),
                }),
        );
        log::debug!("{}: {} nested entries selected", container.name(), items.len() - before);
    }

    items
}

fn is_nested_candidate(entry: &P4kEntry) -> bool {
    let extension_matches = entry
        .extension()
        .is_some_and(|ext| NESTED_CONTAINER_EXTENSIONS.iter().any(|c| ext.eq_ignore_ascii_case(c)));
    extension_matches
        && !entry
            .file_name()
            .to_ascii_lowercase()
            .starts_with(SKIPPED_CONTAINER_PREFIX)
}

/// Write `items` under the output directory.
///
/// A failing item is recorded in the report and does not stop the pass.
/// Only an unusable output directory or thread pool is an error.
pub fn extract(
    items: &[ExtractItem],
    config: &ExtractConfig,
    decoder: &dyn DocumentDecoder,
    progress: &dyn Progress,
) -> Result<BatchReport> {
    fs::create_dir_all(&config.output_dir)
        .map_err(|e| Error::Config(format!("cannot create {}: {e}", config.output_dir.display())))?;

    batch::run(
        "extract",
        items,
        config.parallelism,
        progress,
        ExtractItem::display_name,
        |item| extract_one(item, config, decoder),
    )
}

fn extract_one(item: &ExtractItem, config: &ExtractConfig, decoder: &dyn DocumentDecoder) -> Result<Outcome> {
    let target = config.output_dir.join(&item.relative_path);
    if config.overwrite == Overwrite::SkipExisting && target.exists() {
        return Ok(Outcome::Skipped);
    }

    let data = item.archive.read(&item.entry)?;

    if config.decode_documents && decoder.is_recognized(&data) {
        match decoder.try_decode(&data) {
            Ok(text) => {
                write_output(&target, text.as_bytes())?;
                return Ok(Outcome::Done);
            }
            Err(e) => log::warn!("{}: decoding failed, writing raw bytes: {e}", item.entry.name()),
        }
    }

    write_output(&target, &data)?;
    Ok(Outcome::Done)
}

/// Write `data` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}
