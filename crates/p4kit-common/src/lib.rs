//! Common utilities for p4kit.
//!
//! This crate provides the foundational pieces shared by every p4kit crate:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`crc`] - CRC-32 (IEEE) checksums as stored in ZIP central directories
//! - [`path`] - Archive path normalization (separators and case folding)

mod error;
mod reader;

pub mod crc;
pub mod path;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
