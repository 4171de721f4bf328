//! Configuration for bulk passes.

use std::path::PathBuf;

/// How many threads a bulk pass uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parallelism {
    /// On the calling thread.
    #[default]
    Sequential,
    /// On a dedicated pool of this many threads.
    Threads(usize),
    /// On the global rayon pool.
    Unbounded,
}

impl Parallelism {
    /// `Unbounded` when `parallel` is set, otherwise `Sequential`.
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            Self::Unbounded
        } else {
            Self::Sequential
        }
    }
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overwrite {
    #[default]
    Always,
    /// Leave the existing file and count the item as skipped.
    SkipExisting,
}

/// Settings shared by extraction passes.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Root that archive paths are mirrored under.
    pub output_dir: PathBuf,
    pub parallelism: Parallelism,
    /// Run recognized documents through the document decoder.
    pub decode_documents: bool,
    pub overwrite: Overwrite,
}

impl ExtractConfig {
    /// Sequential, overwriting, no document decoding.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            parallelism: Parallelism::default(),
            decode_documents: false,
            overwrite: Overwrite::default(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_decode_documents(mut self, decode: bool) -> Self {
        self.decode_documents = decode;
        self
    }

    pub fn with_overwrite(mut self, overwrite: Overwrite) -> Self {
        self.overwrite = overwrite;
        self
    }
}
