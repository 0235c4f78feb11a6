//! # Headless render device
//!
//! A [`RenderDevice`] that records every call and, when given a framebuffer,
//! rasterises draws in software. Programs are matched to a CPU [`Shading`]
//! with [`HeadlessDevice::bind_shading`]; uniforms are read back from each
//! draw's staged block through the program's reflected layout, so the names
//! and values checked here are the ones the WGSL receives.

pub mod raster;
pub mod shading;

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::{Matrix3, Matrix4, SquareMatrix, Vector2, Vector3, Vector4};

use self::raster::{ClipVertex, Framebuffer};
use self::shading::BoundTextures;
pub use self::shading::Shading;
use super::device::{BlendMode, DepthCompare, GeometryHandle, RenderDevice, RenderState};
use crate::gfx::resources::{DecodedImage, SamplerOptions, TextureUnit};
use crate::gfx::scene::vertex::Vertex3D;
use crate::gfx::shader::{ProgramId, ShaderProgram, UniformLayout, UniformView};

/// Snapshot of one draw call
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub program_name: String,
    pub geometry: GeometryHandle,
    pub state: RenderState,
    pub uniforms: Vec<u8>,
    pub layout: Arc<UniformLayout>,
    pub textures: Vec<Option<TextureUnit>>,
}

impl DrawRecord {
    pub fn uniforms(&self) -> UniformView<'_> {
        UniformView::new(&self.layout, &self.uniforms)
    }
}

#[derive(Debug, Clone)]
pub enum DeviceCommand {
    SetBlendMode(BlendMode),
    SetDepthWrite(bool),
    SetDepthCompare(DepthCompare),
    Draw(DrawRecord),
}

struct Geometry {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
}

#[derive(Default)]
pub struct HeadlessDevice {
    state: RenderState,
    geometry: Vec<Geometry>,
    textures: HashMap<TextureUnit, (DecodedImage, SamplerOptions)>,
    shading: HashMap<ProgramId, Shading>,
    commands: Vec<DeviceCommand>,
    target: Option<Framebuffer>,
}

impl HeadlessDevice {
    /// Recording-only device
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that also rasterises into a `width` x `height` framebuffer
    pub fn with_target(width: u32, height: u32, clear: [f32; 4]) -> Self {
        Self {
            target: Some(Framebuffer::new(width, height, clear)),
            ..Self::default()
        }
    }

    /// Selects the CPU shading evaluated for draws with `program`.
    pub fn bind_shading(&mut self, program: &ShaderProgram, shading: Shading) {
        self.shading.insert(program.id(), shading);
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::Draw(record) => Some(record),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// Number of fixed-function state calls recorded
    pub fn state_change_count(&self) -> usize {
        self.commands.len() - self.draw_count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn framebuffer(&self) -> Option<&Framebuffer> {
        self.target.as_ref()
    }

    pub fn clear_target(&mut self, color: [f32; 4]) {
        if let Some(target) = &mut self.target {
            target.clear(color);
        }
    }

    pub fn is_texture_uploaded(&self, unit: TextureUnit) -> bool {
        self.textures.contains_key(&unit)
    }

    fn rasterize(&mut self, record: &DrawRecord) {
        let Some(target) = self.target.as_mut() else {
            return;
        };
        let Some(&shading) = self.shading.get(&record.program) else {
            log::debug!("no headless shading bound for '{}'", record.program_name);
            return;
        };
        let Some(geometry) = self.geometry.get(record.geometry.0 as usize) else {
            return;
        };

        let u = record.uniforms();
        let identity = Matrix4::identity();
        let projection = u.mat4("projection").unwrap_or(identity);
        let view = u.mat4("view").unwrap_or(identity);
        let model = u.mat4("model").unwrap_or(identity);
        let normal_matrix = u.mat3("normalMatrix").unwrap_or_else(Matrix3::identity);
        let model3 = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());

        let vertices: Vec<ClipVertex> = geometry
            .vertices
            .iter()
            .map(|v| {
                let world = model * Vector3::from(v.position).extend(1.0);
                let tangent = Vector4::from(v.tangent);
                ClipVertex {
                    clip: projection * view * world,
                    world: world.truncate(),
                    uv: Vector2::from(v.tex_coord),
                    normal: normal_matrix * Vector3::from(v.normal),
                    tangent: (model3 * tangent.truncate()).extend(tangent.w),
                }
            })
            .collect();

        let textures = BoundTextures {
            uploaded: &self.textures,
            bindings: &record.textures,
            layout: &record.layout,
        };
        raster::draw_triangles(target, record.state, &vertices, &geometry.indices, |fragment| {
            shading::shade(shading, &u, &textures, fragment)
        });
    }
}

impl RenderDevice for HeadlessDevice {
    fn upload_geometry(&mut self, label: &str, vertices: &[Vertex3D], indices: &[u32]) -> GeometryHandle {
        log::trace!("headless upload '{}': {} vertices", label, vertices.len());
        self.geometry.push(Geometry {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        });
        GeometryHandle(self.geometry.len() as u32 - 1)
    }

    fn upload_texture(&mut self, unit: TextureUnit, image: &DecodedImage, options: SamplerOptions) {
        self.textures.insert(unit, (image.clone(), options));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
        self.commands.push(DeviceCommand::SetBlendMode(mode));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
        self.commands.push(DeviceCommand::SetDepthWrite(enabled));
    }

    fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.state.depth_compare = compare;
        self.commands.push(DeviceCommand::SetDepthCompare(compare));
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn draw(&mut self, program: &ShaderProgram, geometry: GeometryHandle) {
        if !program.is_linked() {
            log::warn!("skipping draw with unlinked program '{}'", program.name());
            return;
        }

        let record = DrawRecord {
            program: program.id(),
            program_name: program.name().to_owned(),
            geometry,
            state: self.state,
            uniforms: program.uniform_bytes().to_vec(),
            layout: program.shared_layout(),
            textures: program.texture_bindings().to_vec(),
        };
        self.rasterize(&record);
        self.commands.push(DeviceCommand::Draw(record));
    }
}
