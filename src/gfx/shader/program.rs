//! Uniform binder
//!
//! A [`ShaderProgram`] owns the WGSL source of one vertex/fragment pair and a
//! staging copy of its uniform block. Setters resolve dotted names against the
//! reflected layout; a name that does not resolve, or resolves to a member of
//! another type, is dropped (and optionally logged once). Staged values persist
//! until overwritten, so a later draw sees whatever was last set.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cgmath::{Matrix3, Matrix4, Vector3, Vector4};

use super::reflection::{UniformLayout, UniformType, UniformView};
use super::source::{read_source, with_header};
use crate::error::ShaderError;
use crate::gfx::lighting::{DirectionalLight, PhongColors, PointLight, SpotLight};
use crate::gfx::resources::{Material, TextureRef, TextureUnit};

static NEXT_PROGRAM_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique program identity, used to key GPU pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    name: String,
    vertex: Option<String>,
    fragment: Option<String>,
    source: Option<String>,
    layout: Arc<UniformLayout>,
    staging: Vec<u8>,
    textures: Vec<Option<TextureUnit>>,
    log_misses: bool,
    reported: HashSet<String>,
}

impl ShaderProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            vertex: None,
            fragment: None,
            source: None,
            layout: Arc::new(UniformLayout::default()),
            staging: Vec::new(),
            textures: Vec::new(),
            log_misses: false,
            reported: HashSet::new(),
        }
    }

    /// Builds and links a program from in-memory stage sources.
    ///
    /// `header` is prepended to the fragment stage.
    pub fn from_sources(
        name: impl Into<String>,
        vertex: &str,
        fragment: &str,
        header: Option<&str>,
    ) -> Result<Self, ShaderError> {
        let mut program = Self::new(name);
        program.load_stage_source(vertex, ShaderStage::Vertex, None);
        program.load_stage_source(fragment, ShaderStage::Fragment, header);
        program.link()?;
        Ok(program)
    }

    /// Builder pattern: Log unresolved uniform names
    pub fn with_miss_logging(mut self, enabled: bool) -> Self {
        self.log_misses = enabled;
        self
    }

    pub fn set_miss_logging(&mut self, enabled: bool) {
        self.log_misses = enabled;
    }

    /// Reads a stage from disk. A missing file is logged and the stage is
    /// left absent; returns whether the stage was loaded.
    pub fn load_stage(
        &mut self,
        path: impl AsRef<Path>,
        stage: ShaderStage,
        header: Option<&str>,
    ) -> bool {
        match read_source(path.as_ref()) {
            Ok(source) => {
                self.load_stage_source(&source, stage, header);
                true
            }
            Err(err) => {
                log::error!("{}: {} stage not loaded: {}", self.name, stage.label(), err);
                false
            }
        }
    }

    pub fn load_stage_source(&mut self, source: &str, stage: ShaderStage, header: Option<&str>) {
        let source = with_header(header, source);
        match stage {
            ShaderStage::Vertex => self.vertex = Some(source),
            ShaderStage::Fragment => self.fragment = Some(source),
        }
    }

    /// Parses both stages as one module and reflects its parameters.
    ///
    /// On failure the program keeps its previous state.
    pub fn link(&mut self) -> Result<(), ShaderError> {
        let missing = |stage: ShaderStage| ShaderError::MissingStage {
            program: self.name.clone(),
            stage: stage.label(),
        };
        let vertex = self.vertex.as_deref().ok_or_else(|| missing(ShaderStage::Vertex))?;
        let fragment = self
            .fragment
            .as_deref()
            .ok_or_else(|| missing(ShaderStage::Fragment))?;

        let source = format!("{}\n{}", vertex, fragment);
        let module = naga::front::wgsl::parse_str(&source).map_err(|err| ShaderError::Parse {
            program: self.name.clone(),
            message: err.emit_to_string(&source),
        })?;
        let layout = UniformLayout::reflect(&module, &self.name)?;

        self.staging = vec![0; layout.block_size() as usize];
        self.textures = vec![None; layout.textures().len()];
        self.layout = Arc::new(layout);
        self.source = Some(source);
        self.reported.clear();

        log::info!("Linked shader program '{}'", self.name);
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.source.is_some()
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Combined WGSL source of the linked module
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn shared_layout(&self) -> Arc<UniformLayout> {
        Arc::clone(&self.layout)
    }

    pub fn uniform_bytes(&self) -> &[u8] {
        &self.staging
    }

    /// Texture unit bound to each reflected texture slot
    pub fn texture_bindings(&self) -> &[Option<TextureUnit>] {
        &self.textures
    }

    pub fn uniforms(&self) -> UniformView<'_> {
        UniformView::new(&self.layout, &self.staging)
    }

    fn miss(&mut self, name: &str, reason: &str) {
        if self.log_misses && self.reported.insert(name.to_owned()) {
            log::warn!("{}: uniform '{}' {}", self.name, name, reason);
        }
    }

    fn write(&mut self, name: &str, accepts: &[UniformType], bytes: &[u8]) {
        match self.layout.uniform(name) {
            Some(slot) if accepts.contains(&slot.ty) => {
                let start = slot.offset as usize;
                self.staging[start..start + bytes.len()].copy_from_slice(bytes);
            }
            Some(slot) => self.miss(name, &format!("is declared as {:?}", slot.ty)),
            None => self.miss(name, "not found"),
        }
    }

    /// Stored as `u32` 0 or 1
    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.write(name, &[UniformType::Uint, UniformType::Int], bytemuck::bytes_of(&(value as u32)));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.write(name, &[UniformType::Int], bytemuck::bytes_of(&value));
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.write(name, &[UniformType::Float], bytemuck::bytes_of(&value));
    }

    pub fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        let data: [f32; 3] = value.into();
        self.write(name, &[UniformType::Vec3], bytemuck::cast_slice(&data));
    }

    pub fn set_vec4(&mut self, name: &str, value: Vector4<f32>) {
        let data: [f32; 4] = value.into();
        self.write(name, &[UniformType::Vec4], bytemuck::cast_slice(&data));
    }

    /// Columns are written with WGSL's 16-byte stride.
    pub fn set_mat3(&mut self, name: &str, value: Matrix3<f32>) {
        let mut data = [0.0f32; 12];
        for (column, chunk) in data.chunks_exact_mut(4).enumerate() {
            chunk[..3].copy_from_slice(AsRef::<[f32; 3]>::as_ref(&value[column]));
        }
        self.write(name, &[UniformType::Mat3], bytemuck::cast_slice(&data));
    }

    pub fn set_mat4(&mut self, name: &str, value: Matrix4<f32>) {
        let data: &[f32; 16] = value.as_ref();
        self.write(name, &[UniformType::Mat4], bytemuck::cast_slice(data));
    }

    /// Binds `texture` to the slot named `name`.
    pub fn set_texture(&mut self, name: &str, texture: TextureRef) {
        match self.layout.texture_index(name) {
            Some(index) => self.textures[index] = Some(texture.unit()),
            None => self.miss(name, "has no texture binding"),
        }
    }

    fn set_optional_map(&mut self, prefix: &str, map: &str, flag: &str, texture: Option<TextureRef>) {
        if let Some(texture) = texture {
            self.set_texture(&format!("{}.{}", prefix, map), texture);
        }
        self.set_bool(&format!("{}.{}", prefix, flag), texture.is_some());
    }

    /// Writes every member of a `Material` block under `prefix`.
    pub fn set_material(&mut self, prefix: &str, material: &Material) {
        self.set_vec4(&format!("{}.ambientColor", prefix), material.ambient_color);
        self.set_vec4(&format!("{}.diffuseColor", prefix), material.diffuse_color);
        self.set_vec4(&format!("{}.specular", prefix), material.specular);
        self.set_float(&format!("{}.shininessCoefficient", prefix), material.shininess);

        self.set_optional_map(prefix, "diffuseMap", "useDiffuseMap", material.active_diffuse_map());
        self.set_optional_map(prefix, "specularMap", "useSpecularMap", material.active_specular_map());
        self.set_optional_map(prefix, "normalMap", "useNormalMap", material.active_normal_map());
    }

    fn set_base_light(&mut self, prefix: &str, colors: &PhongColors) {
        self.set_vec4(&format!("{}.base.ambient", prefix), colors.ambient);
        self.set_vec4(&format!("{}.base.diffuse", prefix), colors.diffuse);
        self.set_vec4(&format!("{}.base.specular", prefix), colors.specular);
    }

    pub fn set_directional_light(&mut self, prefix: &str, light: &DirectionalLight) {
        self.set_base_light(prefix, &light.colors);
        self.set_vec4(&format!("{}.castDir", prefix), light.cast_dir());
    }

    pub fn set_point_light(&mut self, prefix: &str, light: &PointLight) {
        self.set_base_light(prefix, &light.colors);
        self.set_vec4(&format!("{}.position", prefix), light.position);
        self.set_float(
            &format!("{}.attenuation.illuminationRadius", prefix),
            light.attenuation.illumination_radius,
        );
        self.set_float(
            &format!("{}.attenuation.minIllumination", prefix),
            light.attenuation.min_illumination,
        );
    }

    pub fn set_spot_light(&mut self, prefix: &str, light: &SpotLight) {
        self.set_base_light(prefix, &light.colors);
        self.set_vec4(&format!("{}.position", prefix), light.position());
        self.set_vec4(&format!("{}.spotDir", prefix), light.spot_dir());
        self.set_float(&format!("{}.spotInnerCosine", prefix), light.inner_cosine());
        self.set_float(&format!("{}.spotOuterCosine", prefix), light.outer_cosine());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::lighting::Attenuation;
    use crate::gfx::resources::{
        DecodedImage, SamplerOptions, Texture, TextureKind, TextureUnitAllocator,
    };
    use crate::gfx::shader::source;
    use cgmath::{Deg, SquareMatrix};

    fn linked(fragment: &str) -> ShaderProgram {
        ShaderProgram::from_sources(
            "test",
            source::FORWARD_VERTEX,
            fragment,
            Some(source::FORWARD_HEADER),
        )
        .unwrap()
    }

    fn texture(units: &mut TextureUnitAllocator) -> Texture {
        Texture::from_image(
            "crate.png",
            TextureKind::Diffuse,
            DecodedImage::solid(1, 1, [255; 4]),
            SamplerOptions::default(),
            units,
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_programs_link() {
        let ambient = ShaderProgram::from_sources(
            "ambient",
            source::FORWARD_VERTEX,
            source::FORWARD_AMBIENT,
            None,
        )
        .unwrap();
        assert!(ambient.layout().uniform("ambient").is_some());
        assert_eq!(ambient.layout().texture_index("diffuseMap"), Some(0));

        for fragment in [source::FORWARD_DIRECTIONAL, source::FORWARD_POINT, source::FORWARD_SPOT] {
            let program = linked(fragment);
            assert!(program.is_linked());
            assert!(program.layout().uniform("material.shininessCoefficient").is_some());
            assert_eq!(program.layout().textures().len(), 3);
        }
    }

    #[test]
    fn test_material_expands_to_dotted_members() {
        let mut units = TextureUnitAllocator::new(4);
        let diffuse = texture(&mut units);
        let material = Material::new("crate")
            .with_diffuse(Vector4::new(0.5, 0.25, 1.0, 1.0))
            .with_shininess(200.0)
            .with_diffuse_map(Some(diffuse.handle()));

        let mut program = linked(source::FORWARD_DIRECTIONAL);
        program.set_material("material", &material);

        let uniforms = program.uniforms();
        assert_eq!(uniforms.vec4("material.diffuseColor"), Some(Vector4::new(0.5, 0.25, 1.0, 1.0)));
        assert_eq!(uniforms.float("material.shininessCoefficient"), Some(200.0));
        assert_eq!(uniforms.uint("material.useDiffuseMap"), Some(1));
        assert_eq!(uniforms.uint("material.useSpecularMap"), Some(0));
        assert_eq!(uniforms.uint("material.useNormalMap"), Some(0));

        let slot = program.layout().texture_index("material.diffuseMap").unwrap();
        assert_eq!(program.texture_bindings()[slot], Some(diffuse.unit()));
    }

    #[test]
    fn test_light_setters_use_light_prefixes() {
        let mut program = linked(source::FORWARD_POINT);
        let light = PointLight::new(
            PhongColors::default(),
            Vector3::new(10.2, 13.0, 10.0),
            Attenuation::new(20.0, 0.001),
        );
        program.set_point_light("pointLight", &light);

        let uniforms = program.uniforms();
        assert_eq!(uniforms.vec4("pointLight.position"), Some(Vector4::new(10.2, 13.0, 10.0, 1.0)));
        assert_eq!(uniforms.float("pointLight.attenuation.illuminationRadius"), Some(20.0));
        assert_eq!(uniforms.float("pointLight.attenuation.minIllumination"), Some(0.001));
        assert_eq!(uniforms.vec4("pointLight.base.diffuse"), Some(Vector4::new(1.0, 1.0, 1.0, 1.0)));

        let mut spot_program = linked(source::FORWARD_SPOT);
        let spot = SpotLight::new(
            PhongColors::default(),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Deg(10.0),
            Deg(14.0),
        );
        spot_program.set_spot_light("spotLight", &spot);
        assert_eq!(spot_program.uniforms().float("spotLight.spotOuterCosine"), Some(spot.outer_cosine()));
    }

    #[test]
    fn test_unresolved_names_are_dropped() {
        let mut program = linked(source::FORWARD_DIRECTIONAL).with_miss_logging(true);
        let before = program.uniform_bytes().to_vec();

        program.set_float("doesNotExist", 1.0);
        // Type mismatch counts as a miss
        program.set_float("viewPos", 1.0);
        program.set_int("material.useDiffuseMap", 7);

        assert_eq!(program.uniform_bytes(), before.as_slice());
    }

    #[test]
    fn test_mat3_columns_are_padded() {
        let mut program = linked(source::FORWARD_DIRECTIONAL);
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        program.set_mat3("normalMatrix", m);
        program.set_mat4("model", Matrix4::identity());

        assert_eq!(program.uniforms().mat3("normalMatrix"), Some(m));
        assert_eq!(program.uniforms().mat4("model"), Some(Matrix4::identity()));
        let slot = program.layout().uniform("normalMatrix").unwrap();
        let padding: f32 = bytemuck::pod_read_unaligned(
            &program.uniform_bytes()[slot.offset as usize + 12..slot.offset as usize + 16],
        );
        assert_eq!(padding, 0.0);
    }

    #[test]
    fn test_values_persist_until_overwritten() {
        let mut program = linked(source::FORWARD_DIRECTIONAL);
        program.set_vec4("viewPos", Vector4::new(1.0, 2.0, 3.0, 1.0));
        program.set_float("material.shininessCoefficient", 8.0);
        program.set_vec4("viewPos", Vector4::new(4.0, 5.0, 6.0, 1.0));

        assert_eq!(program.uniforms().vec4("viewPos"), Some(Vector4::new(4.0, 5.0, 6.0, 1.0)));
        assert_eq!(program.uniforms().float("material.shininessCoefficient"), Some(8.0));
    }

    #[test]
    fn test_link_errors() {
        let mut program = ShaderProgram::new("broken");
        assert!(matches!(program.link(), Err(ShaderError::MissingStage { stage: "vertex", .. })));

        program.load_stage_source(source::FORWARD_VERTEX, ShaderStage::Vertex, None);
        program.load_stage_source("fn fs_main( {", ShaderStage::Fragment, None);
        assert!(matches!(program.link(), Err(ShaderError::Parse { .. })));
        assert!(!program.is_linked());

        // Unlinked programs accept writes and drop them
        program.set_float("anything", 1.0);
        assert!(program.uniform_bytes().is_empty());
    }

    #[test]
    fn test_missing_stage_file_leaves_stage_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut program = ShaderProgram::new("disk");
        assert!(!program.load_stage(dir.path().join("nope.wgsl"), ShaderStage::Vertex, None));

        let path = dir.path().join("ambient.wgsl");
        std::fs::write(&path, source::FORWARD_AMBIENT).unwrap();
        assert!(program.load_stage(&path, ShaderStage::Fragment, None));
        assert!(matches!(program.link(), Err(ShaderError::MissingStage { stage: "vertex", .. })));
    }
}
