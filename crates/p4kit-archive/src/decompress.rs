//! Codec dispatch for entry data.

use std::io::{Read, Write};

use flate2::bufread::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::source::ViewCursor;
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Zstandard level used when writing archives.
pub const ZSTD_LEVEL: i32 = 3;

/// Wrap the (decrypted) compressed bytes in a streaming decoder.
///
/// The zstd decoder stops after one frame so that cipher padding after the
/// frame is never parsed as another frame.
pub fn decoder(method: CompressionMethod, data: ViewCursor) -> Result<Box<dyn Read + Send>> {
    match method {
        CompressionMethod::Store => Ok(Box::new(data)),
        CompressionMethod::Deflate => Ok(Box::new(DeflateDecoder::new(data))),
        CompressionMethod::Zstd => {
            let decoder = zstd::stream::read::Decoder::with_buffer(data)
                .map_err(|e| Error::Decompression(e.to_string()))?
                .single_frame();
            Ok(Box::new(decoder))
        }
        CompressionMethod::Unknown(id) => Err(Error::UnsupportedCompression(id)),
    }
}

/// Compress `data` with `method`.
pub fn compress(method: CompressionMethod, data: &[u8]) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Store => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Zstd => Ok(zstd::encode_all(data, ZSTD_LEVEL)?),
        CompressionMethod::Unknown(id) => Err(Error::UnsupportedCompression(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteView;

    fn decode(method: CompressionMethod, compressed: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        decoder(method, ByteView::from_vec(compressed).cursor())
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_zstd_ignores_trailing_padding() {
        let original = b"Hello, World! This is a test of Zstandard compression.";
        let mut compressed = compress(CompressionMethod::Zstd, original).unwrap();
        compressed.extend_from_slice(&[0u8; 11]);

        assert_eq!(decode(CompressionMethod::Zstd, compressed), original);
    }

    #[test]
    fn test_deflate_stream() {
        let original = b"Hello, World! This is a test of DEFLATE compression.".repeat(8);
        let compressed = compress(CompressionMethod::Deflate, &original).unwrap();
        assert!(compressed.len() < original.len());

        assert_eq!(decode(CompressionMethod::Deflate, compressed), original);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let cursor = ByteView::from_vec(vec![1, 2, 3]).cursor();
        assert!(matches!(
            decoder(CompressionMethod::Unknown(14), cursor),
            Err(Error::UnsupportedCompression(14))
        ));
    }
}
