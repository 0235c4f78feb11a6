//! The GPU seam
//!
//! The forward passes talk to the GPU only through [`RenderDevice`]: fixed
//! function state, geometry and texture uploads, and draws. The wgpu backend
//! turns these into pipelines and a render pass; the headless backend
//! rasterises them in software.

use crate::gfx::resources::{DecodedImage, SamplerOptions, TextureUnit};
use crate::gfx::scene::vertex::Vertex3D;
use crate::gfx::shader::ShaderProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Source replaces destination
    #[default]
    Replace,
    /// `src * ONE + dst * ONE`
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthCompare {
    #[default]
    Less,
    LessEqual,
    Equal,
    Always,
}

impl DepthCompare {
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Equal => incoming == stored,
            Self::Always => true,
        }
    }
}

/// Fixed-function state captured with every draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub blend: BlendMode,
    pub depth_write: bool,
    pub depth_compare: DepthCompare,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Replace,
            depth_write: true,
            depth_compare: DepthCompare::Less,
        }
    }
}

/// Uploaded vertex and index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub(crate) u32);

pub trait RenderDevice {
    /// Uploads an indexed triangle list.
    fn upload_geometry(&mut self, label: &str, vertices: &[Vertex3D], indices: &[u32]) -> GeometryHandle;

    /// Uploads pixels for the texture bound to `unit`.
    fn upload_texture(&mut self, unit: TextureUnit, image: &DecodedImage, options: SamplerOptions);

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn set_depth_write(&mut self, enabled: bool);

    fn set_depth_compare(&mut self, compare: DepthCompare);

    fn render_state(&self) -> RenderState;

    /// Draws `geometry` with the program's current uniforms and textures.
    fn draw(&mut self, program: &ShaderProgram, geometry: GeometryHandle);
}
