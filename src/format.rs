//! Video geometry, chroma layout and bit depth
//!
//! Describes the shape of a decoded AV1 stream and derives the per-plane
//! texture sizes and the rescale factor handed to the YUV conversion shader.

use crate::error::PlayerError;

/// Chroma subsampling of a decoded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 4:2:0 - chroma is half width, half height
    I420,
    /// 4:2:2 - chroma is half width, full height
    I422,
    /// 4:4:4 - chroma is full resolution
    I444,
}

impl PixelLayout {
    /// Map the codec library's layout code (dav1d numbering)
    ///
    /// Monochrome (I400) and unknown codes have no chroma planes to upload
    /// and are rejected.
    pub fn from_raw(code: i32) -> Result<Self, PlayerError> {
        match code {
            1 => Ok(PixelLayout::I420),
            2 => Ok(PixelLayout::I422),
            3 => Ok(PixelLayout::I444),
            other => Err(PlayerError::UnsupportedLayout(other)),
        }
    }

    /// Chroma plane dimensions for a luma plane of `width` x `height`
    pub fn chroma_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            PixelLayout::I420 => (width / 2, height / 2),
            PixelLayout::I422 => (width / 2, height),
            PixelLayout::I444 => (width, height),
        }
    }
}

impl std::fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelLayout::I420 => write!(f, "I420"),
            PixelLayout::I422 => write!(f, "I422"),
            PixelLayout::I444 => write!(f, "I444"),
        }
    }
}

/// Bits per decoded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BitDepth {
    Eight,
    Ten,
    Twelve,
}

impl BitDepth {
    /// Decode the high-bit-depth code reported by the extended info query
    pub fn from_hbd(hbd: u8) -> Self {
        match hbd {
            2 => BitDepth::Twelve,
            1 => BitDepth::Ten,
            _ => BitDepth::Eight,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Ten => 10,
            BitDepth::Twelve => 12,
        }
    }

    /// Bytes per sample in both the decoded plane and the target texture
    pub fn bytes_per_sample(&self) -> usize {
        if self.bits() > 8 {
            2
        } else {
            1
        }
    }

    /// Multiplier that stretches a sample stored in a 16-bit normalized
    /// texture back to the full display range.
    ///
    /// 8-bit samples live in an 8-bit normalized texture and need no rescale.
    pub fn rescale_factor(&self) -> f32 {
        match self {
            BitDepth::Eight => 1.0,
            deep => {
                let max_decoded = (1u32 << deep.bits()) as f64;
                (1.0 / (max_decoded / 65536.0)) as f32
            }
        }
    }

    /// Texture format for the planes of this depth
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        match self {
            BitDepth::Eight => wgpu::TextureFormat::R8Unorm,
            _ => wgpu::TextureFormat::R16Unorm,
        }
    }
}

/// Shape of a decoded stream, queried once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub bit_depth: BitDepth,
}

impl VideoGeometry {
    pub fn chroma_size(&self) -> (u32, u32) {
        self.layout.chroma_size(self.width, self.height)
    }

    /// Tightly packed row size of the luma plane in bytes
    pub fn luma_row_bytes(&self) -> usize {
        self.width as usize * self.bit_depth.bytes_per_sample()
    }
}
