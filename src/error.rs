//! Error types for the decode-and-upload pipeline

use thiserror::Error;

use crate::input::InputSource;
use crate::upload::UploadError;

/// Errors surfaced to the caller of the player
///
/// Running out of frames is not an error; see [`crate::DecodeSession::next_frame`].
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The input transport cannot be addressed as one contiguous region
    #[error("unsupported input kind: {0} (expected a file, a mapped view or unmanaged memory)")]
    UnsupportedInputKind(&'static str),

    /// Mapping the input file failed
    #[error("failed to map input file: {0}")]
    Map(#[from] std::io::Error),

    /// The codec library could not parse the stream header
    #[error("failed to open AV1 stream ({len} bytes)")]
    OpenFailed { len: usize },

    /// The stream uses a chroma layout the upload path does not handle
    #[error("unsupported pixel layout in AV1 stream (code {0})")]
    UnsupportedLayout(i32),

    /// The native codec library could not be loaded
    #[error("failed to load codec library: {0}")]
    LibraryLoad(String),

    /// A required entry point is missing from the codec library
    #[error("codec library is missing symbol `{0}`")]
    MissingSymbol(&'static str),

    /// The GPU device lacks something the planes need
    #[error("GPU device unsuitable: {0}")]
    Gpu(String),

    /// `current_frame` was called before `play`
    #[error("no stream is playing")]
    NotPlaying,

    /// Codec output violated the plane upload contract
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// A failed attempt to start decoding
///
/// Carries the input back when the caller kept ownership of it, so a
/// borrowed transport is never released by a failed setup.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OpenError {
    pub error: PlayerError,
    /// The caller's transport, present only when it was passed with `owns == false`
    pub input: Option<InputSource>,
}

impl OpenError {
    pub fn new(error: PlayerError, input: Option<InputSource>) -> Self {
        Self { error, input }
    }

    /// Take the transport back, dropping the error
    pub fn into_input(self) -> Option<InputSource> {
        self.input
    }
}

impl From<PlayerError> for OpenError {
    fn from(error: PlayerError) -> Self {
        Self { error, input: None }
    }
}
