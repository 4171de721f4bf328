//! CRC-32 checksum utilities.
//!
//! ZIP-derived archives record the IEEE CRC-32 of every entry's uncompressed
//! bytes in the central directory.

pub use crc32fast::Hasher;

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_checksum() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_known_checksum() {
        // Standard check value for CRC-32/ISO-HDLC.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_hasher_matches_one_shot() {
        let mut hasher = Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), checksum(b"hello world"));
    }
}
