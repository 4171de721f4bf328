//! ZIP format structures.
//!
//! Packed on-disk records of the ZIP layout P4K builds on, including the
//! ZIP64 end-of-central-directory pair. Every struct here excludes its 4-byte
//! signature, which callers check separately.

pub mod central_dir;
mod eocd;
mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::{Eocd64Locator, Eocd64Record, EocdRecord};
pub use local::LocalFileHeader;

/// 16-bit legacy field value meaning "see the ZIP64 record".
pub const SATURATED_U16: u16 = u16::MAX;

/// 32-bit legacy field value meaning "see the ZIP64 record".
pub const SATURATED_U32: u32 = u32::MAX;

/// Compression methods found in P4K archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store,
    /// Raw DEFLATE.
    Deflate,
    /// Zstandard, under the vendor-assigned method id 100.
    Zstd,
    /// Any other method id; entries using it cannot be decoded.
    Unknown(u16),
}

impl CompressionMethod {
    /// Method id as written in ZIP headers.
    pub fn id(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Deflate => 8,
            Self::Zstd => 100,
            Self::Unknown(id) => id,
        }
    }
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Store,
            8 => Self::Deflate,
            100 => Self::Zstd,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => f.write_str("store"),
            Self::Deflate => f.write_str("deflate"),
            Self::Zstd => f.write_str("zstd"),
            Self::Unknown(id) => write!(f, "method {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_ids_roundtrip() {
        for id in [0u16, 8, 100, 14] {
            assert_eq!(CompressionMethod::from(id).id(), id);
        }
        assert_eq!(CompressionMethod::from(14), CompressionMethod::Unknown(14));
    }
}
