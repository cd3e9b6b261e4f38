//! Boundary to the AV1 codec library
//!
//! The decode itself happens in an opaque native library. This module
//! describes the narrow call surface the pipeline needs from it, and
//! [`Dav1dFile`] provides that surface over a runtime-loaded `dav1dfile`.

mod dav1dfile;

pub use dav1dfile::{Dav1dContext, Dav1dFile};

/// Geometry reported by the extended info query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedVideoInfo {
    pub width: i32,
    pub height: i32,
    /// Raw pixel layout code (dav1d numbering)
    pub layout: i32,
    /// High-bit-depth code: 0 = 8-bit, 1 = 10-bit, 2 = 12-bit
    pub hbd: u8,
}

/// Geometry reported by the legacy info query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: i32,
    pub height: i32,
    pub layout: i32,
}

/// Plane pointers for one decoded frame, as returned across the C boundary
///
/// The pointers stay valid until the next read or until the context closes.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame {
    pub y: *const u8,
    pub u: *const u8,
    pub v: *const u8,
    pub y_len: u32,
    /// Shared by the U and V planes
    pub uv_len: u32,
    pub y_stride: u32,
    pub uv_stride: u32,
}

/// The call surface of an AV1 decoding library
pub trait Av1Codec {
    /// Opaque decode context handle
    type Context;

    /// Open a decode context over `len` bytes at `data`
    ///
    /// Returns `None` when the library cannot parse the stream.
    ///
    /// # Safety
    /// `data..data + len` must stay readable until the returned context is
    /// passed to [`Av1Codec::close`].
    unsafe fn open(&self, data: *const u8, len: usize) -> Option<Self::Context>;

    /// Geometry including bit depth
    ///
    /// Returns `None` when the loaded library build does not provide the
    /// extended query.
    fn video_info_extended(&self, context: &Self::Context) -> Option<ExtendedVideoInfo>;

    /// Geometry without bit depth
    fn video_info(&self, context: &Self::Context) -> VideoInfo;

    /// Advance by `frame_count` frames and return the planes of the result
    ///
    /// `None` means no frame is available right now.
    fn read_video(&self, context: &mut Self::Context, frame_count: i32) -> Option<RawFrame>;

    /// Whether the decoder has consumed the whole stream
    fn end_of_stream(&self, context: &Self::Context) -> bool;

    /// Rewind to the start of the stream
    fn reset(&self, context: &mut Self::Context);

    /// Destroy the context
    fn close(&self, context: Self::Context);
}
