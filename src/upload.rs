//! Plane upload engine
//!
//! Moves decoded planes into fixed-size textures. Planes whose rows are
//! already tightly packed go across in one bulk write straight from codec
//! memory; padded planes are first repacked row by row into a scratch buffer
//! that is kept between frames.

use thiserror::Error;

use crate::format::BitDepth;
use crate::session::{Frame, Plane};

/// Codec output that breaks the upload contract
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Rows are shorter than the texture's row
    #[error("plane stride {stride} is smaller than the {row_bytes}-byte texture row")]
    InvalidStride { stride: usize, row_bytes: usize },

    /// The plane does not hold a single full row
    #[error("plane of {len} bytes holds no full row at stride {stride}")]
    TruncatedPlane { len: usize, stride: usize },
}

/// A 2D image that receives tightly packed rows from the top down
pub trait PlaneTarget {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Write `rows` rows of `bytes_per_row` bytes each, starting at row 0
    ///
    /// `data` holds exactly `bytes_per_row * rows` bytes.
    fn write_rows(&mut self, data: &[u8], bytes_per_row: usize, rows: u32);
}

/// Which scratch buffer a plane repacks into
///
/// U and V have the same size and are uploaded one after the other, so they
/// share one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchSlot {
    Luma,
    Chroma,
}

/// How a plane reached its texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPath {
    /// Rows were already tight; written straight from the plane
    Direct,
    /// Row padding was stripped through the scratch buffer
    Repacked,
    /// The target has no pixels
    Skipped,
}

/// Counters for the upload paths taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub direct: u64,
    pub repacked: u64,
    /// Times a scratch buffer had to grow
    pub scratch_grows: u64,
}

/// Uploads planes into [`PlaneTarget`]s, reusing scratch memory across frames
#[derive(Debug, Default)]
pub struct PlaneUploader {
    luma_scratch: Vec<u8>,
    chroma_scratch: Vec<u8>,
    stats: UploadStats,
}

impl PlaneUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    /// Bytes currently held by a scratch buffer
    pub fn scratch_len(&self, slot: ScratchSlot) -> usize {
        match slot {
            ScratchSlot::Luma => self.luma_scratch.len(),
            ScratchSlot::Chroma => self.chroma_scratch.len(),
        }
    }

    /// Upload one plane into `target`
    ///
    /// At most `min(plane rows, target height)` rows are written; the plane is
    /// never read past its length and the target never written past its height.
    pub fn upload<T: PlaneTarget + ?Sized>(
        &mut self,
        plane: &Plane<'_>,
        slot: ScratchSlot,
        target: &mut T,
        bit_depth: BitDepth,
    ) -> Result<UploadPath, UploadError> {
        let (width, height) = (target.width(), target.height());
        if width == 0 || height == 0 {
            return Ok(UploadPath::Skipped);
        }

        let row_bytes = width as usize * bit_depth.bytes_per_sample();
        let stride = plane.stride;
        if stride == 0 || stride < row_bytes {
            return Err(UploadError::InvalidStride { stride, row_bytes });
        }

        let plane_rows = plane.data.len() / stride;
        let rows = plane_rows.min(height as usize);
        if rows == 0 {
            return Err(UploadError::TruncatedPlane {
                len: plane.data.len(),
                stride,
            });
        }
        if rows < height as usize {
            tracing::warn!(rows, height, "plane shorter than its texture");
        }

        if stride == row_bytes {
            target.write_rows(&plane.data[..rows * stride], row_bytes, rows as u32);
            self.stats.direct += 1;
            return Ok(UploadPath::Direct);
        }

        let needed = row_bytes * rows;
        let scratch = match slot {
            ScratchSlot::Luma => &mut self.luma_scratch,
            ScratchSlot::Chroma => &mut self.chroma_scratch,
        };
        if scratch.len() < needed {
            tracing::debug!(?slot, from = scratch.len(), to = needed, "growing upload scratch");
            scratch.resize(needed, 0);
            self.stats.scratch_grows += 1;
        }

        let packed = &mut scratch[..needed];
        for (dst, src) in packed
            .chunks_exact_mut(row_bytes)
            .zip(plane.data.chunks(stride))
        {
            dst.copy_from_slice(&src[..row_bytes]);
        }

        target.write_rows(packed, row_bytes, rows as u32);
        self.stats.repacked += 1;
        Ok(UploadPath::Repacked)
    }

    /// Upload Y, then U, then V
    pub fn upload_frame<T: PlaneTarget + ?Sized>(
        &mut self,
        frame: &Frame<'_>,
        y: &mut T,
        u: &mut T,
        v: &mut T,
        bit_depth: BitDepth,
    ) -> Result<[UploadPath; 3], UploadError> {
        Ok([
            self.upload(&frame.y, ScratchSlot::Luma, y, bit_depth)?,
            self.upload(&frame.u, ScratchSlot::Chroma, u, bit_depth)?,
            self.upload(&frame.v, ScratchSlot::Chroma, v, bit_depth)?,
        ])
    }
}
