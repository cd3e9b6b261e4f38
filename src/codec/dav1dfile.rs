//! Runtime bindings to the `dav1dfile` library
//!
//! dav1dfile wraps dav1d behind a handful of plain C functions operating on
//! an in-memory IVF/OBU stream. The library is loaded with `libloading` so a
//! missing or older build degrades at load time instead of at link time.

use std::ffi::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use super::{Av1Codec, ExtendedVideoInfo, RawFrame, VideoInfo};
use crate::error::PlayerError;

type OpenFromMemoryFn = unsafe extern "C" fn(*const u8, u32, *mut *mut c_void) -> c_int;
type CloseFn = unsafe extern "C" fn(*mut c_void);
type VideoInfoFn = unsafe extern "C" fn(*mut c_void, *mut c_int, *mut c_int, *mut c_int);
type VideoInfo2Fn = unsafe extern "C" fn(*mut c_void, *mut c_int, *mut c_int, *mut c_int, *mut u8);
type EosFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type ResetFn = unsafe extern "C" fn(*mut c_void);
type ReadVideoFn = unsafe extern "C" fn(
    *mut c_void,
    c_int,
    *mut *mut c_void,
    *mut *mut c_void,
    *mut *mut c_void,
    *mut u32,
    *mut u32,
    *mut u32,
    *mut u32,
) -> c_int;

/// Library file names tried when no explicit path is configured
#[cfg(target_os = "windows")]
const DEFAULT_NAMES: &[&str] = &["dav1dfile.dll", "./dav1dfile.dll"];
#[cfg(target_os = "macos")]
const DEFAULT_NAMES: &[&str] = &["libdav1dfile.dylib", "libdav1dfile.0.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_NAMES: &[&str] = &["libdav1dfile.so", "libdav1dfile.so.0"];

/// Decode context handle owned by the library
#[derive(Debug)]
pub struct Dav1dContext(NonNull<c_void>);

/// A loaded dav1dfile library
pub struct Dav1dFile {
    open_from_memory: OpenFromMemoryFn,
    close: CloseFn,
    videoinfo: VideoInfoFn,
    /// Absent in builds that predate high-bit-depth output
    videoinfo2: Option<VideoInfo2Fn>,
    eos: EosFn,
    reset: ResetFn,
    readvideo: ReadVideoFn,
    /// Keeps the function pointers above valid
    _lib: libloading::Library,
}

impl Dav1dFile {
    /// Load the library from the platform's default names
    pub fn load() -> Result<Self, PlayerError> {
        let paths: Vec<PathBuf> = DEFAULT_NAMES.iter().map(PathBuf::from).collect();
        Self::load_from(&paths)
    }

    /// Load the library from the first path that opens
    pub fn load_from(paths: &[PathBuf]) -> Result<Self, PlayerError> {
        let mut last_error = String::from("no library paths given");
        for path in paths {
            match Self::load_path(path) {
                Ok(lib) => return Ok(lib),
                Err(e) => {
                    log::debug!("dav1dfile: {} not usable: {}", path.display(), e);
                    last_error = e.to_string();
                }
            }
        }
        Err(PlayerError::LibraryLoad(last_error))
    }

    fn load_path(path: &Path) -> Result<Self, PlayerError> {
        // SAFETY: loading runs the library's initializers; dav1dfile has none with side effects
        let lib = unsafe { libloading::Library::new(path) }
            .map_err(|e| PlayerError::LibraryLoad(format!("{}: {}", path.display(), e)))?;

        // SAFETY: each symbol is cast to the signature declared in dav1dfile.h
        let codec = unsafe {
            let open_from_memory = required::<OpenFromMemoryFn>(&lib, "df_open_from_memory")?;
            let close = required::<CloseFn>(&lib, "df_close")?;
            let videoinfo = required::<VideoInfoFn>(&lib, "df_videoinfo")?;
            let videoinfo2 = lib.get::<VideoInfo2Fn>(b"df_videoinfo2").ok().map(|s| *s);
            let eos = required::<EosFn>(&lib, "df_eos")?;
            let reset = required::<ResetFn>(&lib, "df_reset")?;
            let readvideo = required::<ReadVideoFn>(&lib, "df_readvideo")?;

            Self {
                open_from_memory,
                close,
                videoinfo,
                videoinfo2,
                eos,
                reset,
                readvideo,
                _lib: lib,
            }
        };

        log::info!(
            "dav1dfile: loaded {} (extended video info: {})",
            path.display(),
            codec.videoinfo2.is_some()
        );
        Ok(codec)
    }

    /// Whether this build reports bit depth
    pub fn has_extended_info(&self) -> bool {
        self.videoinfo2.is_some()
    }
}

unsafe fn required<T: Copy + 'static>(
    lib: &libloading::Library,
    name: &'static str,
) -> Result<T, PlayerError> {
    lib.get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|_| PlayerError::MissingSymbol(name))
}

impl Av1Codec for Dav1dFile {
    type Context = Dav1dContext;

    unsafe fn open(&self, data: *const u8, len: usize) -> Option<Dav1dContext> {
        let Ok(size) = u32::try_from(len) else {
            tracing::warn!(len, "stream larger than the codec's 32-bit size limit");
            return None;
        };
        let mut context: *mut c_void = ptr::null_mut();
        let ok = (self.open_from_memory)(data, size, &mut context);
        if ok == 0 {
            return None;
        }
        NonNull::new(context).map(Dav1dContext)
    }

    fn video_info_extended(&self, context: &Dav1dContext) -> Option<ExtendedVideoInfo> {
        let videoinfo2 = self.videoinfo2?;
        let (mut width, mut height, mut layout, mut hbd) = (0, 0, 0, 0u8);
        // SAFETY: the context is live and all out-pointers are valid locals
        unsafe { videoinfo2(context.0.as_ptr(), &mut width, &mut height, &mut layout, &mut hbd) };
        Some(ExtendedVideoInfo {
            width,
            height,
            layout,
            hbd,
        })
    }

    fn video_info(&self, context: &Dav1dContext) -> VideoInfo {
        let (mut width, mut height, mut layout) = (0, 0, 0);
        // SAFETY: the context is live and all out-pointers are valid locals
        unsafe { (self.videoinfo)(context.0.as_ptr(), &mut width, &mut height, &mut layout) };
        VideoInfo {
            width,
            height,
            layout,
        }
    }

    fn read_video(&self, context: &mut Dav1dContext, frame_count: i32) -> Option<RawFrame> {
        let (mut y, mut u, mut v) = (ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
        let (mut y_len, mut uv_len, mut y_stride, mut uv_stride) = (0u32, 0u32, 0u32, 0u32);
        // SAFETY: the context is live and all out-pointers are valid locals
        let ok = unsafe {
            (self.readvideo)(
                context.0.as_ptr(),
                frame_count,
                &mut y,
                &mut u,
                &mut v,
                &mut y_len,
                &mut uv_len,
                &mut y_stride,
                &mut uv_stride,
            )
        };
        if ok != 1 {
            return None;
        }
        Some(RawFrame {
            y: y as *const u8,
            u: u as *const u8,
            v: v as *const u8,
            y_len,
            uv_len,
            y_stride,
            uv_stride,
        })
    }

    fn end_of_stream(&self, context: &Dav1dContext) -> bool {
        // SAFETY: the context is live
        unsafe { (self.eos)(context.0.as_ptr()) != 0 }
    }

    fn reset(&self, context: &mut Dav1dContext) {
        // SAFETY: the context is live
        unsafe { (self.reset)(context.0.as_ptr()) }
    }

    fn close(&self, context: Dav1dContext) {
        // SAFETY: the context is live and is not used after this call
        unsafe { (self.close)(context.0.as_ptr()) }
    }
}
