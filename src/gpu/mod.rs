//! wgpu resources for displaying decoded frames
//!
//! Plane textures that receive uploads, the RGBA render target, and the
//! conversion pass between them.

mod renderer;
mod texture;

pub use renderer::{YuvParams, YuvRenderer};
pub use texture::{plane_features, PlaneTexture, QueuedPlane, RenderTarget, YuvTextures};
