//! DDS mipmap merging.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use p4kit_archive::{P4kEntry, P4kFileSystem};
use p4kit_common::path;

use crate::header::DdsInfo;
use crate::suffix::MipSuffixRule;
use crate::{Error, Result};

/// Highest suffix index that can name a mip level; DDS holds at most 32.
pub const MAX_MIP_INDEX: u32 = 32;

/// Byte order of the reassembled texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainLayout {
    /// Base entry first, then siblings by ascending suffix.
    #[default]
    Concatenate,
    /// DDS header from the base, then siblings from highest suffix (largest
    /// mip) to lowest, then the mips stored in the base. Textures with
    /// several faces are written face by face, each with its full chain.
    MipOrder,
}

/// Options for [`merge_with`] and [`merge_files`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub rule: MipSuffixRule,
    pub layout: ChainLayout,
}

/// A tolerated irregularity in a mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    /// Sibling matched without the separator or with leading zeros.
    AmbiguousSuffix { name: String, index: u32 },
    /// No sibling carries this index although a higher one exists.
    MissingMip(u32),
    /// A second sibling resolved to an index already in the chain; it was
    /// left out.
    DuplicateMip { name: String, index: u32 },
    /// Sibling index above [`MAX_MIP_INDEX`]; it was left out.
    IndexOutOfRange { name: String, index: u32 },
    /// A sibling's length is not a whole number of faces of its mip level.
    MipSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousSuffix { name, index } => write!(f, "ambiguous mip suffix on {name} (index {index})"),
            Self::MissingMip(index) => write!(f, "mip {index} missing"),
            Self::DuplicateMip { name, index } => write!(f, "{name} duplicates mip {index}, skipped"),
            Self::IndexOutOfRange { name, index } => write!(f, "{name}: index {index} cannot be a mip, skipped"),
            Self::MipSizeMismatch { name, expected, actual } => {
                write!(f, "{name}: {actual} bytes is not a multiple of mip size {expected}")
            }
        }
    }
}

/// A reassembled texture.
#[derive(Debug, Clone)]
pub struct MergedTexture {
    /// The texture bytes; the sum of the decoded chain lengths.
    pub data: Vec<u8>,
    pub warnings: Vec<MergeWarning>,
    /// Names of the chain members, base first then ascending suffix.
    pub chain: Vec<String>,
}

impl MergedTexture {
    /// Whether any sibling was split off.
    pub fn is_split(&self) -> bool {
        self.chain.len() > 1
    }
}

struct ChainMember<T> {
    index: u32,
    name: String,
    source: T,
}

struct Part {
    name: String,
    data: Vec<u8>,
}

/// Merge the texture at `base` with its siblings using default options.
pub fn merge(base: &str, fs: &P4kFileSystem) -> Result<MergedTexture> {
    merge_with(base, fs, &MergeOptions::default())
}

/// Merge the texture at `base` with its mip siblings from the same
/// directory. Irregular chains are merged best-effort and reported in
/// [`MergedTexture::warnings`].
pub fn merge_with(base: &str, fs: &P4kFileSystem, options: &MergeOptions) -> Result<MergedTexture> {
    let base_entry = fs.entry(base).ok_or_else(|| Error::NotFound(base.to_string()))?;
    let siblings = fs
        .files_in(path::parent(base_entry.name()))
        .into_iter()
        .map(|entry| (entry.file_name().to_string(), entry));

    let (chain, warnings) = select_chain(base_entry.file_name(), siblings, &options.rule);

    let archive = fs.archive();
    let base_data = archive.read(base_entry)?;
    let parts = chain
        .into_iter()
        .map(|member: ChainMember<&P4kEntry>| -> Result<Part> {
            Ok(Part {
                name: member.source.name().to_string(),
                data: archive.read(member.source)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    assemble(base_entry.name(), base_data, parts, warnings, options.layout)
}

/// Like [`merge_with`] with a strict suffix rule, failing with
/// [`Error::IncompleteChain`] when an index is missing.
pub fn merge_strict(base: &str, fs: &P4kFileSystem, options: &MergeOptions) -> Result<MergedTexture> {
    let mut options = options.clone();
    options.rule.strict = true;

    let merged = merge_with(base, fs, &options)?;
    let missing: Vec<u32> = merged
        .warnings
        .iter()
        .filter_map(|warning| match warning {
            MergeWarning::MissingMip(index) => Some(*index),
            _ => None,
        })
        .collect();

    if !missing.is_empty() {
        return Err(Error::IncompleteChain {
            base: base.to_string(),
            missing,
        });
    }
    Ok(merged)
}

/// Merge a texture extracted to disk with the sibling files next to it.
pub fn merge_files<P: AsRef<Path>>(base: P, options: &MergeOptions) -> Result<MergedTexture> {
    let base = base.as_ref();
    let base_data = fs::read(base).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(base.display().to_string()),
        _ => Error::Io(e),
    })?;
    let base_name = base
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::NotFound(base.display().to_string()))?;

    let pattern = format!("{}*", glob::Pattern::escape(&base.to_string_lossy()));
    let siblings = glob::glob(&pattern)?.filter_map(|path| path.ok()).filter_map(|path| {
        let name = path.file_name()?.to_str()?.to_string();
        Some((name, path))
    });

    let (chain, warnings) = select_chain(base_name, siblings, &options.rule);
    let parts = chain
        .into_iter()
        .map(|member: ChainMember<PathBuf>| -> Result<Part> {
            Ok(Part {
                data: fs::read(&member.source)?,
                name: member.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    assemble(&base.display().to_string(), base_data, parts, warnings, options.layout)
}

/// Pick the siblings of `base_name` from `candidates`, ordered by ascending
/// index.
fn select_chain<T, I>(base_name: &str, candidates: I, rule: &MipSuffixRule) -> (Vec<ChainMember<T>>, Vec<MergeWarning>)
where
    I: IntoIterator<Item = (String, T)>,
{
    let mut warnings = Vec::new();
    let mut members = Vec::new();

    for (name, source) in candidates {
        let Some(suffix) = rule.classify(base_name, &name) else {
            continue;
        };
        if suffix.index() > MAX_MIP_INDEX {
            warnings.push(MergeWarning::IndexOutOfRange {
                name,
                index: suffix.index(),
            });
            continue;
        }
        if suffix.is_ambiguous() {
            warnings.push(MergeWarning::AmbiguousSuffix {
                name: name.clone(),
                index: suffix.index(),
            });
            if rule.strict {
                continue;
            }
        }
        members.push((suffix.is_ambiguous(), ChainMember {
            index: suffix.index(),
            name,
            source,
        }));
    }

    // Exact matches win over ambiguous ones for the same index.
    members.sort_by(|(a_ambiguous, a), (b_ambiguous, b)| {
        a.index.cmp(&b.index).then(a_ambiguous.cmp(b_ambiguous)).then_with(|| a.name.cmp(&b.name))
    });

    let mut chain: Vec<ChainMember<T>> = Vec::with_capacity(members.len());
    for (_, member) in members {
        if chain.last().is_some_and(|last| last.index == member.index) {
            warnings.push(MergeWarning::DuplicateMip {
                name: member.name,
                index: member.index,
            });
            continue;
        }
        chain.push(member);
    }

    if let Some(max) = chain.last().map(|member| member.index) {
        let mut present = chain.iter().map(|member| member.index).peekable();
        for index in 1..=max {
            while present.next_if(|&i| i < index).is_some() {}
            if present.peek() != Some(&index) {
                warnings.push(MergeWarning::MissingMip(index));
            }
        }
    }

    (chain, warnings)
}

fn assemble(
    base_name: &str,
    base_data: Vec<u8>,
    parts: Vec<Part>,
    mut warnings: Vec<MergeWarning>,
    layout: ChainLayout,
) -> Result<MergedTexture> {
    let total = base_data.len() + parts.iter().map(|part| part.data.len()).sum::<usize>();
    let mut chain = Vec::with_capacity(parts.len() + 1);
    chain.push(base_name.to_string());
    chain.extend(parts.iter().map(|part| part.name.clone()));

    let data = match layout {
        ChainLayout::Concatenate => {
            let mut data = base_data;
            data.reserve(total - data.len());
            for part in &parts {
                data.extend_from_slice(&part.data);
            }
            data
        }
        ChainLayout::MipOrder => {
            let info = DdsInfo::parse(&base_data)?;
            let header_len = info.header_len();
            let mip_sizes = info.mip_sizes();
            let splits: Vec<&Part> = parts.iter().rev().collect();
            let tail = &base_data[header_len..];

            let mut data = Vec::with_capacity(total);
            data.extend_from_slice(&base_data[..header_len]);
            match face_count(&splits, tail, &mip_sizes) {
                Some(faces) => {
                    let tail_per_face = tail.len() / faces;
                    for face in 0..faces {
                        for (part, &size) in splits.iter().zip(&mip_sizes) {
                            data.extend_from_slice(&part.data[face * size..(face + 1) * size]);
                        }
                        data.extend_from_slice(&tail[face * tail_per_face..(face + 1) * tail_per_face]);
                    }
                }
                None => {
                    for (part, &expected) in splits.iter().zip(&mip_sizes) {
                        if part.data.len() % expected != 0 {
                            warnings.push(MergeWarning::MipSizeMismatch {
                                name: part.name.clone(),
                                expected,
                                actual: part.data.len(),
                            });
                        }
                    }
                    log::debug!("{base_name}: irregular face layout, writing mips in chain order");
                    for part in &splits {
                        data.extend_from_slice(&part.data);
                    }
                    data.extend_from_slice(tail);
                }
            }
            data
        }
    };

    for warning in &warnings {
        log::warn!("{base_name}: {warning}");
    }

    Ok(MergedTexture { data, warnings, chain })
}

/// Number of faces when every split holds `faces` copies of its level and
/// the base holds `faces` copies of the remaining levels.
fn face_count(splits: &[&Part], tail: &[u8], mip_sizes: &[usize]) -> Option<usize> {
    if splits.len() > mip_sizes.len() {
        return None;
    }
    let faces = match splits.first() {
        Some(largest) => largest.data.len() / mip_sizes[0],
        None => 1,
    };
    if faces == 0 {
        return None;
    }

    let splits_fit = splits
        .iter()
        .zip(mip_sizes)
        .all(|(part, &size)| part.data.len() == faces * size);
    let tail_per_face: usize = mip_sizes[splits.len()..].iter().sum();
    (splits_fit && tail.len() == faces * tail_per_face).then_some(faces)
}
