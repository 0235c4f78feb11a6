//! wgpu implementation of [`RenderDevice`]
//!
//! Draw calls are recorded during the frame: each snapshots the program's
//! uniform block into the [`UniformArena`] and remembers the state, geometry
//! and texture units it was issued with. [`WgpuDevice::flush`] uploads the
//! arena, creates missing pipelines and bind groups, and replays the draws in
//! order inside one render pass.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::device::{BlendMode, DepthCompare, GeometryHandle, RenderDevice, RenderState};
use super::pipeline_manager::{PipelineConfig, PipelineManager};
use crate::gfx::resources::{DecodedImage, SamplerOptions, TextureResource, TextureUnit};
use crate::gfx::scene::vertex::Vertex3D;
use crate::gfx::shader::{ProgramId, ShaderProgram};
use crate::wgpu_utils::UniformArena;

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct PendingDraw {
    program: ProgramId,
    state: RenderState,
    geometry: GeometryHandle,
    uniform_offset: u32,
    textures: Vec<Option<TextureUnit>>,
}

type TextureKey = (ProgramId, Vec<Option<TextureUnit>>);

pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipelines: PipelineManager,
    arena: UniformArena,
    geometry: Vec<GpuGeometry>,
    textures: HashMap<TextureUnit, TextureResource>,
    white: TextureResource,
    state: RenderState,
    draws: Vec<PendingDraw>,
    uniform_groups: HashMap<ProgramId, wgpu::BindGroup>,
    uniform_generation: u64,
    texture_groups: HashMap<TextureKey, wgpu::BindGroup>,
}

impl WgpuDevice {
    /// # Arguments
    /// * `device` - Shared wgpu device
    /// * `queue` - Shared wgpu queue
    /// * `color_format` - Format of the surface drawn into
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, color_format: wgpu::TextureFormat) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let config = PipelineConfig::default()
            .with_label("Forward")
            .with_color_format(color_format)
            .with_depth_format(TextureResource::DEPTH_FORMAT);
        let white = TextureResource::white(&device, &queue);

        Self {
            pipelines: PipelineManager::new(device.clone(), config),
            arena: UniformArena::new(alignment),
            geometry: Vec::new(),
            textures: HashMap::new(),
            white,
            state: RenderState::default(),
            draws: Vec::new(),
            uniform_groups: HashMap::new(),
            uniform_generation: 0,
            texture_groups: HashMap::new(),
            device,
            queue,
        }
    }

    pub fn pipelines(&self) -> &PipelineManager {
        &self.pipelines
    }

    fn prepare(&mut self) {
        self.arena.upload(&self.device, &self.queue);
        if self.arena.generation() != self.uniform_generation {
            self.uniform_groups.clear();
            self.uniform_generation = self.arena.generation();
        }

        for index in 0..self.draws.len() {
            let (program, state) = (self.draws[index].program, self.draws[index].state);
            if self.pipelines.get_pipeline(program, state).is_none() {
                log::warn!("no pipeline for program {:?}", program);
                continue;
            }
            self.prepare_uniform_group(program);
            let key = (program, self.draws[index].textures.clone());
            self.prepare_texture_group(key);
        }
    }

    fn prepare_uniform_group(&mut self, program: ProgramId) {
        if self.uniform_groups.contains_key(&program) {
            return;
        }
        let (Some(resources), Some(buffer)) = (self.pipelines.program(program), self.arena.buffer()) else {
            return;
        };
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Uniforms", resources.name)),
            layout: &resources.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(resources.uniform_size),
                }),
            }],
        });
        self.uniform_groups.insert(program, group);
    }

    fn prepare_texture_group(&mut self, key: TextureKey) {
        if self.texture_groups.contains_key(&key) {
            return;
        }
        let Some(resources) = self.pipelines.program(key.0) else {
            return;
        };

        let mut entries = Vec::new();
        for (slot, &(texture_binding, sampler_binding)) in resources.texture_bindings.iter().enumerate() {
            // Unbound slots sample white
            let texture = key
                .1
                .get(slot)
                .copied()
                .flatten()
                .and_then(|unit| self.textures.get(&unit))
                .unwrap_or(&self.white);
            entries.push(wgpu::BindGroupEntry {
                binding: texture_binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            if let Some(binding) = sampler_binding {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
        }

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Textures", resources.name)),
            layout: &resources.texture_layout,
            entries: &entries,
        });
        self.texture_groups.insert(key, group);
    }

    /// Replays the recorded draws into `color` and `depth`, clearing both first.
    ///
    /// # Arguments
    /// * `encoder` - Command encoder for this frame
    /// * `color` - Colour attachment view
    /// * `depth` - Depth attachment view
    /// * `clear_color` - Colour the attachment is cleared to
    pub fn flush(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_color: wgpu::Color,
    ) {
        self.prepare();

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &self.draws {
                let Some(pipeline) = self.pipelines.pipeline(draw.program, draw.state) else {
                    continue;
                };
                let Some(uniforms) = self.uniform_groups.get(&draw.program) else {
                    continue;
                };
                let Some(textures) = self.texture_groups.get(&(draw.program, draw.textures.clone())) else {
                    continue;
                };
                let Some(geometry) = self.geometry.get(draw.geometry.0 as usize) else {
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
                render_pass.set_bind_group(1, textures, &[]);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..geometry.index_count, 0, 0..1);
            }
        }

        self.draws.clear();
        self.arena.clear();
    }
}

impl RenderDevice for WgpuDevice {
    fn upload_geometry(&mut self, label: &str, vertices: &[Vertex3D], indices: &[u32]) -> GeometryHandle {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.geometry.push(GpuGeometry {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        });
        GeometryHandle(self.geometry.len() as u32 - 1)
    }

    fn upload_texture(&mut self, unit: TextureUnit, image: &DecodedImage, options: SamplerOptions) {
        let label = format!("Texture Unit {}", unit.index());
        let resource = TextureResource::from_image(&self.device, &self.queue, image, options, &label);
        self.textures.insert(unit, resource);
        // Bind groups may reference the texture previously on this unit
        self.texture_groups.clear();
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
    }

    fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.state.depth_compare = compare;
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn draw(&mut self, program: &ShaderProgram, geometry: GeometryHandle) {
        if !program.is_linked() {
            log::warn!("skipping draw with unlinked program '{}'", program.name());
            return;
        }
        if let Err(e) = self.pipelines.register_program(program) {
            log::error!("{}", e);
            return;
        }

        let uniform_offset = self.arena.push(program.uniform_bytes());
        self.draws.push(PendingDraw {
            program: program.id(),
            state: self.state,
            geometry,
            uniform_offset,
            textures: program.texture_bindings().to_vec(),
        });
    }
}
