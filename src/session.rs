//! Decode session: one codec context over one compressed buffer
//!
//! The session pairs the opaque context with the buffer it reads from and
//! tears them down in dependency order (context first, buffer second) on
//! every exit path.

use std::sync::Arc;

use crate::codec::{Av1Codec, RawFrame};
use crate::error::{OpenError, PlayerError};
use crate::format::{BitDepth, PixelLayout, VideoGeometry};
use crate::input::{CompressedBuffer, InputSource};

/// One decoded plane, borrowed from the codec until the next decode call
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    /// Plane bytes as reported by the codec, including row padding
    pub data: &'a [u8],
    /// Distance between the starts of consecutive rows, in bytes
    pub stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    /// # Safety
    /// `ptr` must be readable for `len` bytes for `'a`.
    unsafe fn from_raw(ptr: *const u8, len: u32, stride: u32) -> Self {
        let data = if ptr.is_null() || len == 0 {
            &[][..]
        } else {
            std::slice::from_raw_parts(ptr, len as usize)
        };
        Self {
            data,
            stride: stride as usize,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Whole rows contained in the plane
    pub fn rows(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }
}

/// The three planes of one decoded frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
}

impl<'a> Frame<'a> {
    /// # Safety
    /// Every pointer in `raw` must be readable for its reported length for `'a`.
    unsafe fn from_raw(raw: &RawFrame) -> Self {
        Self {
            y: Plane::from_raw(raw.y, raw.y_len, raw.y_stride),
            u: Plane::from_raw(raw.u, raw.uv_len, raw.uv_stride),
            v: Plane::from_raw(raw.v, raw.uv_len, raw.uv_stride),
        }
    }
}

/// An open decode context and the buffer it decodes from
pub struct DecodeSession<C: Av1Codec> {
    codec: Arc<C>,
    context: Option<C::Context>,
    buffer: Option<CompressedBuffer>,
    geometry: VideoGeometry,
    frames_requested: u64,
}

impl<C: Av1Codec> DecodeSession<C> {
    /// Open a decode context over `buffer` and query its geometry
    ///
    /// On failure the context (if any) is closed and the buffer is released;
    /// a borrowed transport is returned inside the error.
    pub fn open(codec: Arc<C>, buffer: CompressedBuffer) -> Result<Self, OpenError> {
        let len = buffer.len();
        // SAFETY: the session keeps `buffer` alive until after the context is closed
        let Some(context) = (unsafe { codec.open(buffer.as_ptr(), len) }) else {
            return Err(OpenError::new(PlayerError::OpenFailed { len }, buffer.release()));
        };

        let geometry = match query_geometry(codec.as_ref(), &context) {
            Ok(geometry) => geometry,
            Err(e) => {
                codec.close(context);
                return Err(OpenError::new(e, buffer.release()));
            }
        };

        tracing::info!(
            "Opened AV1 stream: {}x{} {} {}-bit, {} bytes",
            geometry.width,
            geometry.height,
            geometry.layout,
            geometry.bit_depth.bits(),
            len
        );

        Ok(Self {
            codec,
            context: Some(context),
            buffer: Some(buffer),
            geometry,
            frames_requested: 0,
        })
    }

    /// Geometry queried when the session opened
    pub fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    /// Sum of the frame counts of every read that produced a frame since the
    /// last open or [`DecodeSession::reset`]
    ///
    /// The codec may clamp a multi-frame skip at the end of the stream, so
    /// this is what was asked for, not the decoder's exact position.
    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    /// Advance by `frame_count` frames and borrow the resulting planes
    ///
    /// `None` means no frame is available this tick (for example at end of
    /// stream); the previous upload stays valid.
    pub fn next_frame(&mut self, frame_count: i32) -> Option<Frame<'_>> {
        let context = self.context.as_mut()?;
        let raw = self.codec.read_video(context, frame_count)?;
        self.frames_requested += frame_count.max(0) as u64;
        // SAFETY: the codec keeps these planes alive until the next read on this
        // context, which cannot happen while the returned borrow of self lives
        Some(unsafe { Frame::from_raw(&raw) })
    }

    /// Advance by one frame
    pub fn decode_next(&mut self) -> Option<Frame<'_>> {
        self.next_frame(1)
    }

    pub fn end_of_stream(&self) -> bool {
        match &self.context {
            Some(context) => self.codec.end_of_stream(context),
            None => true,
        }
    }

    /// Rewind to the first frame
    pub fn reset(&mut self) {
        if let Some(context) = self.context.as_mut() {
            self.codec.reset(context);
            self.frames_requested = 0;
            tracing::debug!("AV1 session rewound");
        }
    }

    /// Close the context, then release the buffer
    ///
    /// Returns the input transport if the caller kept ownership of it.
    pub fn close(mut self) -> Option<InputSource> {
        self.teardown()
    }

    fn teardown(&mut self) -> Option<InputSource> {
        if let Some(context) = self.context.take() {
            self.codec.close(context);
        }
        self.buffer.take().and_then(CompressedBuffer::release)
    }
}

impl<C: Av1Codec> Drop for DecodeSession<C> {
    fn drop(&mut self) {
        drop(self.teardown());
    }
}

/// Query geometry, preferring the entry point that reports bit depth
fn query_geometry<C: Av1Codec>(codec: &C, context: &C::Context) -> Result<VideoGeometry, PlayerError> {
    let (width, height, layout, bit_depth) = match codec.video_info_extended(context) {
        Some(info) => (info.width, info.height, info.layout, BitDepth::from_hbd(info.hbd)),
        None => {
            tracing::debug!("extended video info unavailable; assuming 8-bit samples");
            let info = codec.video_info(context);
            (info.width, info.height, info.layout, BitDepth::Eight)
        }
    };

    Ok(VideoGeometry {
        width: width.max(0) as u32,
        height: height.max(0) as u32,
        layout: PixelLayout::from_raw(layout)?,
        bit_depth,
    })
}
