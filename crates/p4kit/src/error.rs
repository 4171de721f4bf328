//! Error types for the p4kit facade.

use thiserror::Error;

use crate::external::DecodeError;

/// Errors returned by extraction passes and helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive error.
    #[error(transparent)]
    Archive(#[from] p4kit_archive::Error),

    /// Texture reconstruction error.
    #[error(transparent)]
    Dds(#[from] p4kit_dds::Error),

    /// An external decoder or converter failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Invalid configuration (output directory, thread pool).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for p4kit operations.
pub type Result<T> = std::result::Result<T, Error>;
