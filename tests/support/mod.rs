//! Shared fixtures: a codec that replays prepared planes and CPU plane images

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use av1_player::codec::{ExtendedVideoInfo, RawFrame, VideoInfo};
use av1_player::{
    Av1Codec, BitDepth, CompressedBuffer, DecodeSession, InputSource, OpenError, PlaneTarget,
    UnmanagedMemory,
};

pub struct ScriptedPlane {
    pub data: Vec<u8>,
    pub stride: u32,
}

/// Prepared frame planes; U and V share a length and stride
pub struct ScriptedFrame {
    pub y: ScriptedPlane,
    pub u: ScriptedPlane,
    pub v: ScriptedPlane,
}

pub struct ScriptedCodec {
    /// Geometry reported by the next open; tests may change it between opens
    pub width: Cell<i32>,
    pub height: Cell<i32>,
    pub layout: i32,
    pub hbd: Option<u8>,
    pub accept: bool,
    pub frames: Vec<ScriptedFrame>,
    pub calls: Cell<usize>,
    pub opened_len: Cell<Option<usize>>,
    pub log: RefCell<Vec<&'static str>>,
}

pub struct Cursor {
    next: usize,
}

impl ScriptedCodec {
    pub fn new(width: i32, height: i32, frames: Vec<ScriptedFrame>) -> Self {
        Self {
            width: Cell::new(width),
            height: Cell::new(height),
            layout: 1,
            hbd: Some(0),
            accept: true,
            frames,
            calls: Cell::new(0),
            opened_len: Cell::new(None),
            log: RefCell::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.set(self.calls.get() + 1);
        self.log.borrow_mut().push(call);
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Av1Codec for ScriptedCodec {
    type Context = Cursor;

    unsafe fn open(&self, _data: *const u8, len: usize) -> Option<Cursor> {
        self.record("open");
        self.opened_len.set(Some(len));
        self.accept.then_some(Cursor { next: 0 })
    }

    fn video_info_extended(&self, _context: &Cursor) -> Option<ExtendedVideoInfo> {
        self.record("videoinfo2");
        self.hbd.map(|hbd| ExtendedVideoInfo {
            width: self.width.get(),
            height: self.height.get(),
            layout: self.layout,
            hbd,
        })
    }

    fn video_info(&self, _context: &Cursor) -> VideoInfo {
        self.record("videoinfo");
        VideoInfo {
            width: self.width.get(),
            height: self.height.get(),
            layout: self.layout,
        }
    }

    fn read_video(&self, context: &mut Cursor, frame_count: i32) -> Option<RawFrame> {
        self.record("readvideo");
        let index = context.next + frame_count.max(1) as usize - 1;
        let frame = self.frames.get(index)?;
        context.next = index + 1;
        Some(RawFrame {
            y: frame.y.data.as_ptr(),
            u: frame.u.data.as_ptr(),
            v: frame.v.data.as_ptr(),
            y_len: frame.y.data.len() as u32,
            uv_len: frame.u.data.len() as u32,
            y_stride: frame.y.stride,
            uv_stride: frame.u.stride,
        })
    }

    fn end_of_stream(&self, context: &Cursor) -> bool {
        self.record("eos");
        context.next >= self.frames.len()
    }

    fn reset(&self, context: &mut Cursor) {
        self.record("reset");
        context.next = 0;
    }

    fn close(&self, _context: Cursor) {
        self.record("close");
    }
}

/// CPU plane image that keeps what was written into it
pub struct CpuPlane {
    pub width: u32,
    pub height: u32,
    pub bytes_per_sample: usize,
    pub pixels: Vec<u8>,
    pub rows_written: u32,
}

impl CpuPlane {
    pub fn new(width: u32, height: u32, bit_depth: BitDepth) -> Self {
        let bytes_per_sample = bit_depth.bytes_per_sample();
        Self {
            width,
            height,
            bytes_per_sample,
            pixels: vec![0; width as usize * height as usize * bytes_per_sample],
            rows_written: 0,
        }
    }

    pub fn row(&self, index: usize) -> &[u8] {
        let row_bytes = self.width as usize * self.bytes_per_sample;
        &self.pixels[index * row_bytes..(index + 1) * row_bytes]
    }
}

impl PlaneTarget for CpuPlane {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn write_rows(&mut self, data: &[u8], bytes_per_row: usize, rows: u32) {
        assert_eq!(data.len(), bytes_per_row * rows as usize);
        self.pixels[..data.len()].copy_from_slice(data);
        self.rows_written = rows;
    }
}

/// Plane of `rows` rows at `stride`, each byte derived from its position
pub fn patterned_plane(stride: u32, rows: u32, seed: u8) -> ScriptedPlane {
    let data = (0..stride as usize * rows as usize)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect();
    ScriptedPlane { data, stride }
}

pub fn i420_frame(_width: u32, height: u32, luma_stride: u32, chroma_stride: u32, seed: u8) -> ScriptedFrame {
    ScriptedFrame {
        y: patterned_plane(luma_stride, height, seed),
        u: patterned_plane(chroma_stride, height / 2, seed.wrapping_add(1)),
        v: patterned_plane(chroma_stride, height / 2, seed.wrapping_add(2)),
    }
}

pub fn memory_input(len: usize) -> InputSource {
    InputSource::Memory(UnmanagedMemory::from_vec(vec![0x12; len]))
}

pub fn open(codec: &Arc<ScriptedCodec>, source: InputSource, owns: bool) -> Result<DecodeSession<ScriptedCodec>, OpenError> {
    let buffer = CompressedBuffer::acquire(source, owns)?;
    DecodeSession::open(Arc::clone(codec), buffer)
}

pub fn targets(session: &DecodeSession<ScriptedCodec>) -> (CpuPlane, CpuPlane, CpuPlane) {
    let geometry = session.geometry();
    let (cw, ch) = geometry.chroma_size();
    (
        CpuPlane::new(geometry.width, geometry.height, geometry.bit_depth),
        CpuPlane::new(cw, ch, geometry.bit_depth),
        CpuPlane::new(cw, ch, geometry.bit_depth),
    )
}
