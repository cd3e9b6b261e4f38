//! GPU textures for decoded planes and the converted output
//!
//! Each plane gets a single-channel texture sized from the stream geometry:
//! `R8Unorm` for 8-bit streams, `R16Unorm` for 10/12-bit streams. The YUV to
//! RGBA pass draws into a separate [`RenderTarget`].

use crate::format::VideoGeometry;
use crate::upload::PlaneTarget;

/// One single-channel plane texture
pub struct PlaneTexture {
    /// The GPU texture
    texture: wgpu::Texture,
    /// Texture view for binding
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl PlaneTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            // COPY_DST for uploading planes, TEXTURE_BINDING for the conversion pass
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Pair this texture with a queue so planes can be written into it
    pub fn writer<'a>(&'a self, queue: &'a wgpu::Queue) -> QueuedPlane<'a> {
        QueuedPlane { plane: self, queue }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

/// A plane texture bound to the queue that writes it
pub struct QueuedPlane<'a> {
    plane: &'a PlaneTexture,
    queue: &'a wgpu::Queue,
}

impl PlaneTarget for QueuedPlane<'_> {
    fn width(&self) -> u32 {
        self.plane.width
    }

    fn height(&self) -> u32 {
        self.plane.height
    }

    fn write_rows(&mut self, data: &[u8], bytes_per_row: usize, rows: u32) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.plane.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row as u32),
                rows_per_image: Some(rows),
            },
            wgpu::Extent3d {
                width: self.plane.width,
                height: rows,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// The Y, U and V textures of one stream
pub struct YuvTextures {
    pub y: PlaneTexture,
    pub u: PlaneTexture,
    pub v: PlaneTexture,
    geometry: VideoGeometry,
}

impl YuvTextures {
    pub fn new(device: &wgpu::Device, geometry: &VideoGeometry) -> Self {
        let format = geometry.bit_depth.texture_format();
        let (uv_width, uv_height) = geometry.chroma_size();

        log::debug!(
            "Allocating YUV textures: Y {}x{}, UV {}x{}, {:?}",
            geometry.width,
            geometry.height,
            uv_width,
            uv_height,
            format
        );

        Self {
            y: PlaneTexture::new(device, "AV1 Y Plane", geometry.width, geometry.height, format),
            u: PlaneTexture::new(device, "AV1 U Plane", uv_width, uv_height, format),
            v: PlaneTexture::new(device, "AV1 V Plane", uv_width, uv_height, format),
            geometry: *geometry,
        }
    }

    pub fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    /// Free the GPU memory now instead of waiting for the last reference
    pub fn destroy(self) {
        self.y.texture.destroy();
        self.u.texture.destroy();
        self.v.texture.destroy();
    }
}

/// RGBA texture the conversion pass renders into
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("AV1 Render Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

/// Device features the plane formats need, limited to what `adapter` offers
///
/// 10/12-bit streams need `TEXTURE_FORMAT_16BIT_NORM`; without it only
/// 8-bit streams can play.
pub fn plane_features(adapter: &wgpu::Adapter) -> wgpu::Features {
    adapter.features() & wgpu::Features::TEXTURE_FORMAT_16BIT_NORM
}
