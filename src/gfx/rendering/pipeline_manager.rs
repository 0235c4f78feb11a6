//! Render pipeline management system for wgpu
//!
//! Each linked [`ShaderProgram`] gets one shader module and a pair of bind
//! group layouts derived from its reflected uniforms: group 0 holds the uniform
//! block at a dynamic offset, group 1 the program's texture and sampler pairs.
//! Pipelines are created lazily, one per program and fixed-function
//! [`RenderState`].

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use super::device::{BlendMode, DepthCompare, RenderState};
use crate::error::ShaderError;
use crate::gfx::scene::vertex::Vertex3D;
use crate::gfx::shader::{ProgramId, ShaderProgram};
use crate::wgpu_utils::binding_types;

/// Configuration for creating a render pipeline
///
/// Defines the target formats and rasteriser state shared by every pipeline
/// of a program; blending and depth state come from the [`RenderState`] a
/// pipeline is requested with.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub primitive_topology: PrimitiveTopology,
    pub cull_mode: Option<Face>,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub multisample: MultisampleState,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Forward Pipeline".to_string(),
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: Some(Face::Back),
            color_format: TextureFormat::Bgra8Unorm,
            depth_format: None,
            multisample: MultisampleState::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    /// Sets the colour target format (builder pattern)
    ///
    /// # Arguments
    /// * `format` - Surface or render target format
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    /// Sets the depth buffer format for depth testing (builder pattern)
    ///
    /// # Arguments
    /// * `format` - Depth attachment format
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Sets primitive topology for this pipeline (builder pattern)
    ///
    /// # Arguments
    /// * `topology` - Primitive topology (TriangleList, etc.)
    pub fn with_primitive_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.primitive_topology = topology;
        self
    }
}

pub fn blend_state(mode: BlendMode) -> BlendState {
    match mode {
        BlendMode::Replace => BlendState::REPLACE,
        BlendMode::Additive => {
            let add = BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            };
            BlendState { color: add, alpha: add }
        }
    }
}

pub fn compare_function(compare: DepthCompare) -> CompareFunction {
    match compare {
        DepthCompare::Less => CompareFunction::Less,
        DepthCompare::LessEqual => CompareFunction::LessEqual,
        DepthCompare::Equal => CompareFunction::Equal,
        DepthCompare::Always => CompareFunction::Always,
    }
}

/// GPU objects shared by every pipeline of one program
pub struct ProgramResources {
    pub name: String,
    pub module: ShaderModule,
    pub uniform_layout: BindGroupLayout,
    pub texture_layout: BindGroupLayout,
    pub pipeline_layout: PipelineLayout,
    pub uniform_size: u64,
    /// `(texture binding, sampler binding)` per texture slot
    pub texture_bindings: Vec<(u32, Option<u32>)>,
}

/// Manages render pipelines with caching and lazy creation
///
/// Programs are registered once; pipelines are created the first time a
/// `(program, state)` pair is requested via [`PipelineManager::get_pipeline`].
pub struct PipelineManager {
    device: Arc<Device>,
    config: PipelineConfig,
    programs: HashMap<ProgramId, ProgramResources>,
    pipelines: HashMap<(ProgramId, RenderState), RenderPipeline>,
}

impl PipelineManager {
    /// Creates a new pipeline manager
    ///
    /// # Arguments
    /// * `device` - Shared wgpu device for creating resources
    /// * `config` - Target formats and rasteriser state
    pub fn new(device: Arc<Device>, config: PipelineConfig) -> Self {
        Self {
            device,
            config,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Compiles a program's module and bind group layouts on first sight
    ///
    /// # Errors
    /// [`ShaderError::NotLinked`] if the program has no linked source.
    pub fn register_program(&mut self, program: &ShaderProgram) -> Result<(), ShaderError> {
        if self.programs.contains_key(&program.id()) {
            return Ok(());
        }
        let source = program.source().ok_or_else(|| ShaderError::NotLinked {
            program: program.name().to_owned(),
        })?;

        let name = program.name();
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });

        let layout = program.layout();
        let uniform_size = u64::from(layout.block_size());
        let uniform_layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{} Uniforms", name)),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: binding_types::uniform_dynamic(uniform_size),
                count: None,
            }],
        });

        let texture_bindings: Vec<(u32, Option<u32>)> = layout
            .textures()
            .iter()
            .map(|slot| (slot.texture_binding, slot.sampler_binding))
            .collect();
        let mut texture_entries = Vec::new();
        for &(texture, sampler) in &texture_bindings {
            texture_entries.push(binding_types::fragment_entry(texture, binding_types::texture_2d()));
            if let Some(sampler) = sampler {
                texture_entries.push(binding_types::fragment_entry(
                    sampler,
                    binding_types::sampler(SamplerBindingType::Filtering),
                ));
            }
        }
        let texture_layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{} Textures", name)),
            entries: &texture_entries,
        });

        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", name)),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        log::debug!(
            "registered program '{}': {} uniform bytes, {} textures",
            name,
            uniform_size,
            texture_bindings.len()
        );

        self.programs.insert(
            program.id(),
            ProgramResources {
                name: name.to_owned(),
                module,
                uniform_layout,
                texture_layout,
                pipeline_layout,
                uniform_size,
                texture_bindings,
            },
        );
        Ok(())
    }

    pub fn program(&self, id: ProgramId) -> Option<&ProgramResources> {
        self.programs.get(&id)
    }

    /// Gets or creates a pipeline (lazy loading)
    ///
    /// # Returns
    /// None if the program was never registered
    pub fn get_pipeline(&mut self, id: ProgramId, state: RenderState) -> Option<&RenderPipeline> {
        if !self.pipelines.contains_key(&(id, state)) {
            let pipeline = self.create_pipeline(id, state)?;
            self.pipelines.insert((id, state), pipeline);
        }
        self.pipelines.get(&(id, state))
    }

    /// Previously created pipeline, without creating one
    pub fn pipeline(&self, id: ProgramId, state: RenderState) -> Option<&RenderPipeline> {
        self.pipelines.get(&(id, state))
    }

    /// Creates a render pipeline for one program and state
    fn create_pipeline(&self, id: ProgramId, state: RenderState) -> Option<RenderPipeline> {
        let program = self.programs.get(&id)?;
        let config = &self.config;
        log::debug!("creating pipeline for '{}' with {:?}", program.name, state);

        let depth_stencil = config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: state.depth_write,
            depth_compare: compare_function(state.depth_compare),
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        let targets = [Some(ColorTargetState {
            format: config.color_format,
            blend: Some(blend_state(state.blend)),
            write_mask: ColorWrites::ALL,
        })];

        Some(self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&format!("{} ({})", config.label, program.name)),
            layout: Some(&program.pipeline_layout),
            vertex: VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex3D::desc()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: config.primitive_topology,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: config.cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: config.multisample,
            multiview: None,
            cache: None,
        }))
    }

    /// Returns pipeline manager statistics
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            programs: self.programs.len(),
            pipelines: self.pipelines.len(),
        }
    }
}

/// Statistics about pipeline manager state
#[derive(Debug)]
pub struct PipelineStats {
    pub programs: usize,
    pub pipelines: usize,
}
