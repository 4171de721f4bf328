//! Error types for texture reconstruction.

use thiserror::Error;

/// Errors that can occur when reassembling DDS textures.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] p4kit_common::Error),

    /// Reading a chain member from the archive failed.
    #[error(transparent)]
    Archive(#[from] p4kit_archive::Error),

    /// Invalid sibling search pattern.
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The base texture does not exist.
    #[error("texture not found: {0}")]
    NotFound(String),

    /// Invalid DDS magic.
    #[error("invalid DDS magic: expected 'DDS ', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid DDS header.
    #[error("invalid DDS header: {0}")]
    InvalidHeader(String),

    /// Mip siblings are missing from the chain.
    #[error("{base}: mip chain incomplete, missing {missing:?}")]
    IncompleteChain { base: String, missing: Vec<u32> },
}

/// Result type for DDS operations.
pub type Result<T> = std::result::Result<T, Error>;
