//! AV1 player: decode, upload and convert one frame per tick
//!
//! Synchronous by design: `current_frame` blocks on the codec and queues the
//! uploads and the conversion pass before returning the render target.

use std::sync::Arc;

use crate::codec::{Av1Codec, Dav1dFile};
use crate::error::{OpenError, PlayerError};
use crate::format::{BitDepth, VideoGeometry};
use crate::gpu::{RenderTarget, YuvRenderer, YuvTextures};
use crate::input::{CompressedBuffer, InputSource};
use crate::session::DecodeSession;
use crate::settings::PlayerSettings;
use crate::upload::{PlaneTarget, PlaneUploader, UploadStats};

/// Plays one AV1 stream into a wgpu render target
pub struct Av1Player<C: Av1Codec = Dav1dFile> {
    codec: Arc<C>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    settings: PlayerSettings,
    session: Option<DecodeSession<C>>,
    textures: Option<YuvTextures>,
    render_target: Option<RenderTarget>,
    renderer: YuvRenderer,
    uploader: PlaneUploader,
}

impl Av1Player<Dav1dFile> {
    /// Load dav1dfile from the configured paths and create a player
    pub fn load(
        device: wgpu::Device,
        queue: wgpu::Queue,
        settings: PlayerSettings,
    ) -> Result<Self, PlayerError> {
        let codec = if settings.library_paths.is_empty() {
            Dav1dFile::load()?
        } else {
            Dav1dFile::load_from(&settings.library_paths())?
        };
        Ok(Self::with_settings(Arc::new(codec), device, queue, settings))
    }
}

impl<C: Av1Codec> Av1Player<C> {
    pub fn new(codec: Arc<C>, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self::with_settings(codec, device, queue, PlayerSettings::default())
    }

    pub fn with_settings(
        codec: Arc<C>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        mut settings: PlayerSettings,
    ) -> Self {
        settings.clamp_frames_per_tick();
        let renderer = YuvRenderer::new(&device);
        Self {
            codec,
            device,
            queue,
            settings,
            session: None,
            textures: None,
            render_target: None,
            renderer,
            uploader: PlaneUploader::new(),
        }
    }

    /// Start playing `source`
    ///
    /// `owns` says whether the player releases the transport when playback
    /// ends; otherwise it is handed back by [`Av1Player::stop`] or by the next
    /// `play`. A stream already playing is replaced only once the new one has
    /// opened, and its transport is returned if the caller kept ownership.
    /// When the new stream cannot play, the current one keeps playing and a
    /// borrowed `source` comes back inside the error.
    pub fn play(&mut self, source: InputSource, owns: bool) -> Result<Option<InputSource>, OpenError> {
        let buffer = CompressedBuffer::acquire(source, owns)?;
        let session = DecodeSession::open(Arc::clone(&self.codec), buffer)?;
        let geometry = *session.geometry();
        if let Err(e) = self.check_device(&geometry) {
            return Err(OpenError::new(e, session.close()));
        }

        let previous = self.session.replace(session).and_then(DecodeSession::close);
        self.allocate(&geometry);
        Ok(previous)
    }

    /// End playback, closing the context before releasing the input
    ///
    /// The last rendered frame stays in the render target.
    pub fn stop(&mut self) -> Option<InputSource> {
        self.session.take().and_then(DecodeSession::close)
    }

    /// Move to a new device, rebuilding every GPU resource on it
    pub fn set_device(&mut self, device: wgpu::Device, queue: wgpu::Queue) -> Result<(), PlayerError> {
        if let Some(geometry) = self.geometry().copied() {
            check_features(&device, &geometry)?;
        }
        self.device = device;
        self.queue = queue;
        self.renderer = YuvRenderer::new(&self.device);
        if let Some(geometry) = self.geometry().copied() {
            self.allocate(&geometry);
        }
        Ok(())
    }

    /// Decode the next frame, upload it and convert it
    ///
    /// Returns the render target, which still holds the previous frame when
    /// no new frame was available this tick.
    pub fn current_frame(&mut self) -> Result<&RenderTarget, PlayerError> {
        if self.decode_and_update(self.settings.frames_per_tick)? {
            self.render();
        }
        self.render_target.as_ref().ok_or(PlayerError::NotPlaying)
    }

    /// Decode `frame_count` frames ahead and upload the planes
    ///
    /// `Ok(false)` means no frame was available; the textures are untouched.
    pub fn decode_and_update(&mut self, frame_count: i32) -> Result<bool, PlayerError> {
        let session = self.session.as_mut().ok_or(PlayerError::NotPlaying)?;
        let textures = self.textures.as_ref().ok_or(PlayerError::NotPlaying)?;

        let mut y = textures.y.writer(&self.queue);
        let mut u = textures.u.writer(&self.queue);
        let mut v = textures.v.writer(&self.queue);
        decode_into(
            session,
            &mut self.uploader,
            [&mut y, &mut u, &mut v],
            frame_count,
            self.settings.loop_playback,
        )
    }

    /// Run the conversion pass into the render target
    pub fn render(&mut self) {
        let Some(target) = &self.render_target else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("AV1 Frame Encoder"),
            });
        self.renderer.render(&mut encoder, target);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn geometry(&self) -> Option<&VideoGeometry> {
        self.session
            .as_ref()
            .map(DecodeSession::geometry)
            .or_else(|| self.textures.as_ref().map(YuvTextures::geometry))
    }

    /// Rescale uniform for the current stream (1.0 when nothing is loaded)
    pub fn rescale_factor(&self) -> f32 {
        self.geometry()
            .map(|g| g.bit_depth.rescale_factor())
            .unwrap_or(1.0)
    }

    pub fn textures(&self) -> Option<&YuvTextures> {
        self.textures.as_ref()
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.render_target.as_ref()
    }

    pub fn upload_stats(&self) -> UploadStats {
        self.uploader.stats()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    fn check_device(&self, geometry: &VideoGeometry) -> Result<(), PlayerError> {
        check_features(&self.device, geometry)
    }

    /// Size the plane textures and render target to `geometry`
    ///
    /// New resources are installed before the old ones are destroyed.
    fn allocate(&mut self, geometry: &VideoGeometry) {
        let textures = YuvTextures::new(&self.device, geometry);
        self.renderer.bind(&self.device, &textures);
        let old_textures = self.textures.replace(textures);

        let target = RenderTarget::new(&self.device, geometry.width, geometry.height);
        let old_target = self.render_target.replace(target);

        if let Some(old) = old_textures {
            old.destroy();
        }
        if let Some(old) = old_target {
            old.destroy();
        }

        self.renderer
            .set_rescale_factor(&self.queue, geometry.bit_depth.rescale_factor());
        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            rescale = geometry.bit_depth.rescale_factor(),
            "allocated AV1 textures"
        );
    }
}

/// One playback tick: decode `frame_count` frames ahead and upload Y, U, V
///
/// With `loop_playback`, a session at end of stream is rewound first so the
/// tick after the last frame shows the first one again. `Ok(false)` means no
/// frame was available and the targets are untouched.
pub fn decode_into<C: Av1Codec, T: PlaneTarget + ?Sized>(
    session: &mut DecodeSession<C>,
    uploader: &mut PlaneUploader,
    planes: [&mut T; 3],
    frame_count: i32,
    loop_playback: bool,
) -> Result<bool, PlayerError> {
    if loop_playback && session.end_of_stream() {
        session.reset();
    }

    let bit_depth = session.geometry().bit_depth;
    let Some(frame) = session.next_frame(frame_count) else {
        return Ok(false);
    };

    let [y, u, v] = planes;
    uploader.upload_frame(&frame, y, u, v, bit_depth)?;
    Ok(true)
}

fn check_features(device: &wgpu::Device, geometry: &VideoGeometry) -> Result<(), PlayerError> {
    if geometry.bit_depth > BitDepth::Eight
        && !device
            .features()
            .contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM)
    {
        return Err(PlayerError::Gpu(format!(
            "{}-bit planes need TEXTURE_FORMAT_16BIT_NORM",
            geometry.bit_depth.bits()
        )));
    }
    Ok(())
}
