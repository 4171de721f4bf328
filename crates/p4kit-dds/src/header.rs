//! DDS header structures.

use p4kit_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result, DDS_MAGIC};

/// DDS file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeader {
    /// Header size (should be 124).
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    /// Depth (for volume textures).
    pub depth: u32,
    /// Number of mipmap levels, counting the full-size image.
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    /// Expected header size.
    pub const SIZE: u32 = 124;

    /// Check if this is a DX10 extended header.
    pub fn is_dx10(&self) -> bool {
        self.pixel_format.four_cc == FourCC::DX10
    }
}

/// DDS pixel format.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsPixelFormat {
    /// Structure size (should be 32).
    pub size: u32,
    pub flags: u32,
    /// Four-character code for compression.
    pub four_cc: FourCC,
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

/// Four-character code for compression type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const DXT1: Self = Self(*b"DXT1");
    pub const DXT3: Self = Self(*b"DXT3");
    pub const DXT5: Self = Self(*b"DXT5");
    /// DX10 extended header follows.
    pub const DX10: Self = Self(*b"DX10");
    pub const BC4U: Self = Self(*b"BC4U");
    pub const BC4S: Self = Self(*b"BC4S");
    pub const BC5U: Self = Self(*b"BC5U");
    pub const BC5S: Self = Self(*b"BC5S");
}

/// DX10 extended header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeaderDxt10 {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

impl DdsHeaderDxt10 {
    pub const BC1_UNORM: u32 = 71;
    pub const BC4_UNORM: u32 = 80;
    pub const BC4_SNORM: u32 = 81;
}

/// A parsed DDS preamble: magic, header and optional DX10 header.
#[derive(Debug, Clone, Copy)]
pub struct DdsInfo {
    pub header: DdsHeader,
    pub dx10: Option<DdsHeaderDxt10>,
}

impl DdsInfo {
    /// Parse the preamble at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::InvalidHeader("file too small".into()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[..4]);
        if &magic != DDS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let mut reader = BinaryReader::new(&data[4..]);
        let header: DdsHeader = reader.read_struct()?;
        let size = header.size;
        if size != DdsHeader::SIZE {
            return Err(Error::InvalidHeader(format!("header size {size}, expected {}", DdsHeader::SIZE)));
        }

        let (width, height, mipmap_count) = (header.width, header.height, header.mipmap_count);
        let max_levels = 32 - width.max(height).max(1).leading_zeros();
        if mipmap_count > max_levels {
            return Err(Error::InvalidHeader(format!(
                "{mipmap_count} mip levels for a {width}x{height} texture (at most {max_levels})"
            )));
        }

        let dx10 = if header.is_dx10() {
            Some(reader.read_struct()?)
        } else {
            None
        };

        Ok(Self { header, dx10 })
    }

    /// Bytes taken by magic and headers; mip data starts here.
    pub fn header_len(&self) -> usize {
        4 + std::mem::size_of::<DdsHeader>()
            + if self.dx10.is_some() {
                std::mem::size_of::<DdsHeaderDxt10>()
            } else {
                0
            }
    }

    /// Size of one face of each mip level, largest first.
    pub fn mip_sizes(&self) -> Vec<usize> {
        let count = self.header.mipmap_count.clamp(1, 32);
        let (width, height) = (self.header.width, self.header.height);
        let block = block_size(self.header.pixel_format.four_cc, self.dx10.map(|h| h.dxgi_format));

        (0..count)
            .map(|level| {
                let w = width.checked_shr(level).unwrap_or(0).max(1);
                let h = height.checked_shr(level).unwrap_or(0).max(1);
                mipmap_size(w, h, block)
            })
            .collect()
    }
}

/// Get the block size for a compression format.
pub fn block_size(four_cc: FourCC, dx10_format: Option<u32>) -> usize {
    // BC1 and BC4 use 8 bytes per block, others use 16
    match four_cc {
        FourCC::DXT1 | FourCC::BC4U | FourCC::BC4S => 8,
        _ => match dx10_format {
            Some(DdsHeaderDxt10::BC1_UNORM | DdsHeaderDxt10::BC4_UNORM | DdsHeaderDxt10::BC4_SNORM) => 8,
            _ => 16,
        },
    }
}

/// Calculate the size in bytes of a block-compressed mipmap level.
pub fn mipmap_size(width: u32, height: u32, block_size: usize) -> usize {
    let blocks_x = (width as usize).div_ceil(4);
    let blocks_y = (height as usize).div_ceil(4);
    blocks_x.max(1) * blocks_y.max(1) * block_size
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Magic plus a DXT5 header for a `width`x`height` texture.
    pub(crate) fn dxt5_preamble(width: u32, height: u32, mipmap_count: u32) -> Vec<u8> {
        let header = DdsHeader {
            size: DdsHeader::SIZE,
            flags: 0x000A_1007,
            height,
            width,
            pitch_or_linear_size: 0,
            depth: 0,
            mipmap_count,
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat {
                size: 32,
                flags: 0x4,
                four_cc: FourCC::DXT5,
                rgb_bit_count: 0,
                r_bit_mask: 0,
                g_bit_mask: 0,
                b_bit_mask: 0,
                a_bit_mask: 0,
            },
            caps: 0x0040_1008,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        };
        let mut out = DDS_MAGIC.to_vec();
        out.extend_from_slice(header.as_bytes());
        out
    }

    #[test]
    fn test_mipmap_size_calculation() {
        // 4x4 block minimum
        assert_eq!(mipmap_size(1, 1, 16), 16);
        assert_eq!(mipmap_size(4, 4, 16), 16);
        assert_eq!(mipmap_size(8, 8, 16), 64);
        assert_eq!(mipmap_size(1024, 1024, 16), 1024 * 1024);
    }

    #[test]
    fn test_parse_preamble() {
        let data = dxt5_preamble(64, 32, 4);
        let info = DdsInfo::parse(&data).unwrap();

        assert_eq!(info.header_len(), 128);
        assert!(info.dx10.is_none());
        assert_eq!(info.mip_sizes(), vec![2048, 512, 128, 32]);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut data = dxt5_preamble(4, 4, 1);
        data[0] = b'X';
        assert!(matches!(DdsInfo::parse(&data), Err(Error::InvalidMagic(_))));
        assert!(matches!(DdsInfo::parse(b"DD"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_rejects_impossible_mip_count() {
        assert!(DdsInfo::parse(&dxt5_preamble(64, 32, 7)).is_ok());
        assert!(matches!(
            DdsInfo::parse(&dxt5_preamble(64, 32, 8)),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(
            DdsInfo::parse(&dxt5_preamble(64, 32, u32::MAX)),
            Err(Error::InvalidHeader(_))
        ));
    }
}
