//! Batch reconstruction of split textures.

use std::collections::BTreeSet;

use p4kit_archive::{P4kEntry, P4kFileSystem};
use p4kit_common::path;
use p4kit_dds::{is_mip_sibling, merge_with, MergeOptions, MipSuffixRule};
use p4kit_diff::{changed_entries, ComparisonNode};

use crate::batch::{self, BatchReport, Outcome, Progress};
use crate::config::{ExtractConfig, Overwrite};
use crate::extract::write_output;
use crate::external::RasterConverter;
use crate::Result;

fn is_dds(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".dds")
}

/// Names of every base texture in the archive, in archive order.
pub fn base_textures(fs: &P4kFileSystem, rule: &MipSuffixRule) -> Vec<String> {
    fs.find(|entry| is_dds(entry.name()) && !is_mip_sibling(entry.name(), rule))
        .map(|entry| entry.name().to_string())
        .collect()
}

/// Base textures touched by a comparison: added or modified `.dds` entries,
/// plus the bases of added or modified mip siblings. Each base appears once,
/// in comparison order.
pub fn changed_textures(root: &ComparisonNode, fs: &P4kFileSystem, rule: &MipSuffixRule) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();

    for entry in changed_entries(root, |p| p.to_ascii_lowercase().contains(".dds")) {
        let Some(base) = base_of(entry, rule) else {
            continue;
        };
        let Some(base_entry) = fs.entry(&base) else {
            log::debug!("{}: base texture {base} not in archive", entry.name());
            continue;
        };
        if seen.insert(base_entry.key()) {
            names.push(base_entry.name().to_string());
        }
    }

    names
}

fn base_of(entry: &P4kEntry, rule: &MipSuffixRule) -> Option<String> {
    if is_dds(entry.name()) {
        return Some(entry.name().to_string());
    }
    if !is_mip_sibling(entry.name(), rule) {
        return None;
    }
    let (base, _) = rule.split(entry.file_name())?;
    if !is_dds(base) {
        return None;
    }
    let parent = path::parent(entry.name());
    Some(if parent.is_empty() {
        base.to_string()
    } else {
        format!("{parent}\\{base}")
    })
}

/// Merge each named texture with its mip siblings, convert it and write it
/// under the output directory.
pub fn extract_textures(
    fs: &P4kFileSystem,
    names: &[String],
    config: &ExtractConfig,
    options: &MergeOptions,
    converter: &dyn RasterConverter,
    progress: &dyn Progress,
) -> Result<BatchReport> {
    std::fs::create_dir_all(&config.output_dir)?;

    batch::run(
        "textures",
        names,
        config.parallelism,
        progress,
        |name| path::to_display(name),
        |name| {
            let mut target = config.output_dir.join(path::relative_output_path(name));
            if config.overwrite == Overwrite::SkipExisting && target.exists() {
                return Ok(Outcome::Skipped);
            }

            let merged = merge_with(name, fs, options)?;
            let converted = converter.convert(name, merged.data)?;
            if let Some(extension) = &converted.extension {
                target.set_extension(extension);
            }
            write_output(&target, &converted.data)?;
            Ok(Outcome::Done)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::NoProgress;
    use crate::external::{ConvertedRaster, DecodeError, Passthrough};
    use p4kit_archive::{OpenOptions, P4kArchive, P4kWriteEntry, P4kWriteOptions, P4kWriter};

    fn filesystem(entries: Vec<(&str, Vec<u8>)>) -> P4kFileSystem {
        let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
        for (name, data) in entries {
            writer.add(P4kWriteEntry::new(name, data)).unwrap();
        }
        let archive = P4kArchive::from_bytes("tex.p4k", writer.finish().unwrap(), OpenOptions::default()).unwrap();
        P4kFileSystem::new(archive)
    }

    fn textures() -> Vec<(&'static str, Vec<u8>)> {
        vec![
            (r"Data\rock.dds", b"DDS base".to_vec()),
            (r"Data\rock.dds.1", b"-one".to_vec()),
            (r"Data\rock.dds.2", b"-two".to_vec()),
            (r"Data\ROCK.DDS.A", b"not a mip".to_vec()),
            (r"Data\sand.dds", b"DDS sand".to_vec()),
            (r"Data\readme.txt", b"text".to_vec()),
        ]
    }

    struct Rename;

    impl RasterConverter for Rename {
        fn convert(&self, name: &str, dds: Vec<u8>) -> std::result::Result<ConvertedRaster, DecodeError> {
            if name.contains("sand") {
                return Err(DecodeError::new("unsupported format"));
            }
            Ok(ConvertedRaster {
                data: dds,
                extension: Some("png".into()),
            })
        }
    }

    #[test]
    fn test_base_textures_skip_siblings() {
        let fs = filesystem(textures());
        let names = base_textures(&fs, &MipSuffixRule::default());
        assert_eq!(names, [r"Data\rock.dds", r"Data\sand.dds"]);
    }

    #[test]
    fn test_extract_merges_chain() {
        let fs = filesystem(textures());
        let out = tempfile::tempdir().unwrap();
        let names = base_textures(&fs, &MipSuffixRule::default());

        let report = extract_textures(
            &fs,
            &names,
            &ExtractConfig::new(out.path()),
            &MergeOptions::default(),
            &Passthrough,
            &NoProgress,
        )
        .unwrap();

        assert_eq!(report.succeeded, 2);
        let rock = std::fs::read(out.path().join("Data").join("rock.dds")).unwrap();
        assert_eq!(rock, b"DDS base-one-two");
    }

    #[test]
    fn test_converter_failure_is_counted() {
        let fs = filesystem(textures());
        let out = tempfile::tempdir().unwrap();
        let names = base_textures(&fs, &MipSuffixRule::default());

        let report = extract_textures(
            &fs,
            &names,
            &ExtractConfig::new(out.path()),
            &MergeOptions::default(),
            &Rename,
            &NoProgress,
        )
        .unwrap();

        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert!(out.path().join("Data").join("rock.png").exists());
    }

    #[test]
    fn test_changed_textures_map_siblings_to_base() {
        let previous = filesystem(textures());
        let mut changed = textures();
        changed[2].1 = b"-TWO".to_vec();
        changed.push((r"Data\new.dds", b"DDS new".to_vec()));
        let current = filesystem(changed);

        let root = p4kit_diff::compare(previous.archive(), current.archive());
        let names = changed_textures(&root, &current, &MipSuffixRule::default());
        assert_eq!(names, [r"Data\new.dds", r"Data\rock.dds"]);
    }
}
