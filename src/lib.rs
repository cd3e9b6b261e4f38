//! AV1 Player Library
//!
//! Plays AV1 video through the dav1dfile decoder into wgpu textures.
//! Compressed input is mapped into memory once, decoded frame by frame, and
//! the Y/U/V planes are uploaded into fixed-size textures before a
//! conversion pass renders RGBA.

pub mod codec;
pub mod error;
pub mod format;
pub mod gpu;
pub mod input;
pub mod player;
pub mod session;
pub mod settings;
pub mod telemetry;
pub mod upload;

pub use codec::{Av1Codec, Dav1dFile};
pub use error::{OpenError, PlayerError};
pub use format::{BitDepth, PixelLayout, VideoGeometry};
pub use gpu::{RenderTarget, YuvRenderer, YuvTextures};
pub use input::{BufferOwnership, CompressedBuffer, InputSource, UnmanagedMemory};
pub use player::{decode_into, Av1Player};
pub use session::{DecodeSession, Frame, Plane};
pub use settings::{PlayerSettings, SettingsError};
pub use upload::{PlaneTarget, PlaneUploader, ScratchSlot, UploadError, UploadPath, UploadStats};
