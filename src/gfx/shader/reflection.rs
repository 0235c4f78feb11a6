//! # Uniform reflection
//!
//! Builds a [`UniformLayout`] from a parsed WGSL module:
//!
//! - The `var<uniform>` at `@group(0) @binding(0)` is flattened into dotted
//!   member paths (`material.diffuseColor`, `pointLight.attenuation.minIllumination`)
//!   with their byte offsets and types.
//! - Every texture in `@group(1)` becomes a texture slot. Its sampler is the
//!   group 1 sampler named `<texture>_sampler`.
//!
//! WGSL cannot put textures inside structs, so a dotted texture name such as
//! `material.diffuseMap` is looked up as the global `material_diffuseMap`.

use std::collections::HashMap;

use cgmath::{Matrix3, Matrix4, Vector3, Vector4};
use naga::{AddressSpace, Module, ScalarKind, TypeInner, VectorSize};

use crate::error::ShaderError;

/// Host-writable uniform member types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformType {
    /// Bytes occupied in the uniform block, including mat3 column padding.
    pub fn size(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub ty: UniformType,
}

/// A texture binding and its paired sampler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    /// WGSL global name
    pub name: String,
    pub texture_binding: u32,
    pub sampler_binding: Option<u32>,
}

/// Reflected parameter table of one linked program
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    block_size: u32,
    uniforms: HashMap<String, UniformSlot>,
    textures: Vec<TextureSlot>,
    texture_lookup: HashMap<String, usize>,
}

impl UniformLayout {
    /// Reflects `module`.
    ///
    /// # Errors
    /// [`ShaderError::MissingUniformBlock`] if no uniform variable is bound at
    /// group 0, binding 0.
    pub fn reflect(module: &Module, program: &str) -> Result<Self, ShaderError> {
        let mut layout = Self::default();
        let mut samplers = HashMap::new();
        let mut block = None;

        for (_, global) in module.global_variables.iter() {
            let (Some(binding), Some(name)) = (&global.binding, &global.name) else {
                continue;
            };
            match (&module.types[global.ty].inner, binding.group) {
                (_, 0) if binding.binding == 0 && global.space == AddressSpace::Uniform => {
                    block = Some(global.ty);
                }
                (TypeInner::Image { .. }, 1) => layout.textures.push(TextureSlot {
                    name: name.clone(),
                    texture_binding: binding.binding,
                    sampler_binding: None,
                }),
                (TypeInner::Sampler { .. }, 1) => {
                    samplers.insert(name.clone(), binding.binding);
                }
                _ => {}
            }
        }

        let block = block.ok_or_else(|| ShaderError::MissingUniformBlock {
            program: program.to_owned(),
        })?;
        layout.block_size = module.types[block].inner.size(module.to_ctx());
        if let TypeInner::Struct { members, .. } = &module.types[block].inner {
            for member in members {
                if let Some(name) = &member.name {
                    layout.flatten(module, member.ty, name.clone(), member.offset);
                }
            }
        }

        layout.textures.sort_by_key(|slot| slot.texture_binding);
        for (index, slot) in layout.textures.iter_mut().enumerate() {
            slot.sampler_binding = samplers.get(&format!("{}_sampler", slot.name)).copied();
            if slot.sampler_binding.is_none() {
                log::warn!("{}: texture '{}' has no paired sampler", program, slot.name);
            }
            layout.texture_lookup.insert(slot.name.clone(), index);
        }

        log::debug!(
            "{}: reflected {} uniforms ({} bytes) and {} textures",
            program,
            layout.uniforms.len(),
            layout.block_size,
            layout.textures.len()
        );
        Ok(layout)
    }

    fn flatten(&mut self, module: &Module, ty: naga::Handle<naga::Type>, path: String, offset: u32) {
        let slot_type = match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    if let Some(name) = &member.name {
                        self.flatten(module, member.ty, format!("{}.{}", path, name), offset + member.offset);
                    }
                }
                return;
            }
            TypeInner::Scalar(scalar) => match scalar.kind {
                ScalarKind::Float => UniformType::Float,
                ScalarKind::Sint => UniformType::Int,
                ScalarKind::Uint => UniformType::Uint,
                _ => return,
            },
            TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
                VectorSize::Bi => UniformType::Vec2,
                VectorSize::Tri => UniformType::Vec3,
                VectorSize::Quad => UniformType::Vec4,
            },
            TypeInner::Matrix {
                columns: VectorSize::Tri,
                rows: VectorSize::Tri,
                ..
            } => UniformType::Mat3,
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                ..
            } => UniformType::Mat4,
            other => {
                log::debug!("uniform '{}' has unsupported type {:?}", path, other);
                return;
            }
        };
        self.uniforms.insert(path, UniformSlot { offset, ty: slot_type });
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn uniform(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.get(name).copied()
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    /// Index of the texture slot for a dotted or WGSL name
    pub fn texture_index(&self, name: &str) -> Option<usize> {
        self.texture_lookup.get(&name.replace('.', "_")).copied()
    }

    pub fn textures(&self) -> &[TextureSlot] {
        &self.textures
    }
}

/// Typed read access to a staged uniform block
#[derive(Debug, Clone, Copy)]
pub struct UniformView<'a> {
    layout: &'a UniformLayout,
    bytes: &'a [u8],
}

impl<'a> UniformView<'a> {
    pub fn new(layout: &'a UniformLayout, bytes: &'a [u8]) -> Self {
        Self { layout, bytes }
    }

    fn words(&self, name: &str, ty: UniformType) -> Option<&'a [u8]> {
        let slot = self.layout.uniform(name).filter(|slot| slot.ty == ty)?;
        let start = slot.offset as usize;
        self.bytes.get(start..start + ty.size() as usize)
    }

    fn f32_at(bytes: &[u8], index: usize) -> f32 {
        let start = index * 4;
        bytemuck::pod_read_unaligned(&bytes[start..start + 4])
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.words(name, UniformType::Float).map(|b| Self::f32_at(b, 0))
    }

    pub fn uint(&self, name: &str) -> Option<u32> {
        self.words(name, UniformType::Uint)
            .map(|b| bytemuck::pod_read_unaligned(&b[0..4]))
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        self.words(name, UniformType::Int)
            .map(|b| bytemuck::pod_read_unaligned(&b[0..4]))
    }

    pub fn vec3(&self, name: &str) -> Option<Vector3<f32>> {
        self.words(name, UniformType::Vec3)
            .map(|b| Vector3::new(Self::f32_at(b, 0), Self::f32_at(b, 1), Self::f32_at(b, 2)))
    }

    pub fn vec4(&self, name: &str) -> Option<Vector4<f32>> {
        self.words(name, UniformType::Vec4).map(|b| {
            Vector4::new(
                Self::f32_at(b, 0),
                Self::f32_at(b, 1),
                Self::f32_at(b, 2),
                Self::f32_at(b, 3),
            )
        })
    }

    pub fn mat3(&self, name: &str) -> Option<Matrix3<f32>> {
        self.words(name, UniformType::Mat3).map(|b| {
            let column = |c: usize| {
                Vector3::new(Self::f32_at(b, c * 4), Self::f32_at(b, c * 4 + 1), Self::f32_at(b, c * 4 + 2))
            };
            Matrix3::from_cols(column(0), column(1), column(2))
        })
    }

    pub fn mat4(&self, name: &str) -> Option<Matrix4<f32>> {
        self.words(name, UniformType::Mat4).map(|b| {
            let column = |c: usize| {
                Vector4::new(
                    Self::f32_at(b, c * 4),
                    Self::f32_at(b, c * 4 + 1),
                    Self::f32_at(b, c * 4 + 2),
                    Self::f32_at(b, c * 4 + 3),
                )
            };
            Matrix4::from_cols(column(0), column(1), column(2), column(3))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        struct Inner { radius: f32, minimum: f32, _pad: vec2<f32> };
        struct Block {
            model: mat4x4<f32>,
            normalMatrix: mat3x3<f32>,
            tint: vec4<f32>,
            inner: Inner,
            flag: u32,
        };
        @group(0) @binding(0) var<uniform> u: Block;
        @group(1) @binding(2) var second_map: texture_2d<f32>;
        @group(1) @binding(3) var second_map_sampler: sampler;
        @group(1) @binding(0) var first: texture_2d<f32>;
        @group(1) @binding(1) var first_sampler: sampler;

        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return u.tint;
        }
    "#;

    fn layout() -> UniformLayout {
        let module = naga::front::wgsl::parse_str(SOURCE).unwrap();
        UniformLayout::reflect(&module, "test").unwrap()
    }

    #[test]
    fn test_struct_members_flatten_to_dotted_paths() {
        let layout = layout();
        assert_eq!(layout.uniform("model"), Some(UniformSlot { offset: 0, ty: UniformType::Mat4 }));
        assert_eq!(layout.uniform("normalMatrix"), Some(UniformSlot { offset: 64, ty: UniformType::Mat3 }));
        assert_eq!(layout.uniform("tint"), Some(UniformSlot { offset: 112, ty: UniformType::Vec4 }));
        assert_eq!(layout.uniform("inner.radius"), Some(UniformSlot { offset: 128, ty: UniformType::Float }));
        assert_eq!(layout.uniform("inner.minimum"), Some(UniformSlot { offset: 132, ty: UniformType::Float }));
        assert_eq!(layout.uniform("flag"), Some(UniformSlot { offset: 144, ty: UniformType::Uint }));
        assert_eq!(layout.uniform("inner"), None);
        assert_eq!(layout.block_size(), 160);
    }

    #[test]
    fn test_textures_sorted_and_paired_with_samplers() {
        let layout = layout();
        let names: Vec<_> = layout.textures().iter().map(|slot| slot.name.as_str()).collect();
        assert_eq!(names, ["first", "second_map"]);
        assert_eq!(layout.textures()[1].sampler_binding, Some(3));
        assert_eq!(layout.texture_index("second.map"), Some(1));
        assert_eq!(layout.texture_index("missing"), None);
    }

    #[test]
    fn test_missing_uniform_block_is_an_error() {
        let module = naga::front::wgsl::parse_str(
            "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
        )
        .unwrap();
        assert!(matches!(
            UniformLayout::reflect(&module, "bare"),
            Err(ShaderError::MissingUniformBlock { .. })
        ));
    }
}
