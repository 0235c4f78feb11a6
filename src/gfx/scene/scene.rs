//! # Scene renderer
//!
//! [`Scene`] owns everything the demo draws: the transform arena, the camera,
//! the light list, meshes, models and the forward shader programs. Each frame
//! the application calls [`Scene::update`] with the elapsed time and an input
//! snapshot, then [`Scene::render`] with a render device.

use std::path::{Path, PathBuf};

use cgmath::{Deg, Rad, Vector3, Vector4};
use winit::keyboard::KeyCode;

use super::import::{ModelImporter, ObjImporter};
use super::mesh::Mesh;
use super::model::{Model, ModelLoader};
use super::timestep::FixedTimestep;
use crate::config::RenderConfig;
use crate::error::TextureError;
use crate::gfx::camera::Camera;
use crate::gfx::geometry::{generate_cube, generate_plane};
use crate::gfx::lighting::{Attenuation, DirectionalLight, Light, PhongColors, PointLight, SpotLight};
use crate::gfx::rendering::forward::{Drawable, ForwardPrograms, FrameContext};
use crate::gfx::rendering::RenderDevice;
use crate::gfx::resources::{
    FileImageLoader, ImageLoader, Material, SamplerOptions, TextureCache, TextureKind,
    TextureUnitAllocator, TextureWrap,
};
use crate::gfx::shader::source::{self, read_source};
use crate::gfx::shader::{ShaderProgram, ShaderStage};
use crate::gfx::transform::{Transform, Transforms};
use crate::input::InputState;

const CUBE_COUNT: usize = 5;
const ORBIT_RADIUS: f32 = 2.0;
/// Degrees of model spin per second of simulation time
const MODEL_SPIN: f32 = 10.0;
const MODEL_SPACING: f32 = 10.0;
const FLASHLIGHT_KEY: KeyCode = KeyCode::KeyX;

/// The four forward programs owned by a scene
///
/// A program that failed to link stays in place but is never handed to the
/// renderer, so its passes are skipped.
pub struct ScenePrograms {
    pub ambient: ShaderProgram,
    pub directional: ShaderProgram,
    pub point: ShaderProgram,
    pub spot: ShaderProgram,
}

impl ScenePrograms {
    /// Programs built from the WGSL sources embedded in the binary
    pub fn builtin(log_misses: bool) -> Self {
        let header = Some(source::FORWARD_HEADER);
        Self {
            ambient: build_program("forward_ambient", source::FORWARD_AMBIENT, None, log_misses),
            directional: build_program("forward_directional", source::FORWARD_DIRECTIONAL, header, log_misses),
            point: build_program("forward_point", source::FORWARD_POINT, header, log_misses),
            spot: build_program("forward_spot", source::FORWARD_SPOT, header, log_misses),
        }
    }

    /// Programs read from `dir`, which holds the same file names as the
    /// embedded sources. Missing files leave the affected program unlinked.
    pub fn from_dir(dir: &Path, log_misses: bool) -> Self {
        let header = match read_source(&dir.join("forward_header.wgsl")) {
            Ok(header) => Some(header),
            Err(e) => {
                log::error!("shader header not loaded: {}", e);
                None
            }
        };
        let load = |name: &str, header: Option<&str>| {
            let mut program = ShaderProgram::new(name).with_miss_logging(log_misses);
            let vertex = program.load_stage(dir.join("forward_vertex.wgsl"), ShaderStage::Vertex, None);
            let fragment = program.load_stage(dir.join(format!("{}.wgsl", name)), ShaderStage::Fragment, header);
            if vertex && fragment {
                if let Err(e) = program.link() {
                    log::error!("{}", e);
                }
            }
            program
        };

        Self {
            ambient: load("forward_ambient", None),
            directional: load("forward_directional", header.as_deref()),
            point: load("forward_point", header.as_deref()),
            spot: load("forward_spot", header.as_deref()),
        }
    }

    /// Borrows the programs for one frame, leaving out disabled light kinds
    ///
    /// # Arguments
    /// * `config` - Per-kind enable switches
    /// * `flashlight` - Whether spot lights are drawn this frame
    pub fn forward(&mut self, config: &RenderConfig, flashlight: bool) -> ForwardPrograms<'_> {
        ForwardPrograms {
            ambient: usable(&mut self.ambient, true),
            directional: usable(&mut self.directional, config.enable_directional),
            point: usable(&mut self.point, config.enable_point),
            spot: usable(&mut self.spot, config.enable_spot && flashlight),
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShaderProgram> {
        [&mut self.ambient, &mut self.directional, &mut self.point, &mut self.spot].into_iter()
    }
}

fn build_program(name: &str, fragment: &str, header: Option<&str>, log_misses: bool) -> ShaderProgram {
    let mut program = ShaderProgram::new(name).with_miss_logging(log_misses);
    program.load_stage_source(source::FORWARD_VERTEX, ShaderStage::Vertex, None);
    program.load_stage_source(fragment, ShaderStage::Fragment, header);
    if let Err(e) = program.link() {
        log::error!("{}", e);
    }
    program
}

fn usable(program: &mut ShaderProgram, enabled: bool) -> Option<&mut ShaderProgram> {
    (enabled && program.is_linked()).then_some(program)
}

/// Camera, lights and drawables of one running demo
pub struct Scene {
    pub transforms: Transforms,
    pub camera: Camera,
    pub lights: Vec<Light>,
    pub meshes: Vec<Mesh>,
    pub models: Vec<Model>,
    pub programs: ScenePrograms,
    textures: TextureCache,
    units: TextureUnitAllocator,
    timestep: FixedTimestep,
    config: RenderConfig,
    flashlight_on: bool,
    /// Light index and starting position of every orbiting point light
    orbits: Vec<(usize, Vector3<f32>)>,
    /// Spot lights that follow the camera
    attached_spots: Vec<usize>,
}

impl Scene {
    /// Creates an empty scene with the demo camera placement
    ///
    /// # Arguments
    /// * `config` - Renderer configuration, kept by the scene
    /// * `aspect` - Viewport width over height
    pub fn new(config: RenderConfig, aspect: f32) -> Self {
        let mut transforms = Transforms::new();
        let camera = Camera::new(
            &mut transforms,
            Transform::new(
                Vector3::new(0.0, 5.0, -5.0),
                Vector3::new(1.0, 1.0, 1.0),
                Vector3::new(Rad::from(Deg(20.0)).0, 0.0, 0.0),
            ),
            Deg(45.0),
            aspect,
            0.1,
            1000.0,
        );

        Self {
            transforms,
            camera,
            lights: Vec::new(),
            meshes: Vec::new(),
            models: Vec::new(),
            programs: ScenePrograms::builtin(config.log_uniform_misses),
            textures: TextureCache::new(),
            units: TextureUnitAllocator::new(config.max_texture_units),
            timestep: FixedTimestep::new(config.fixed_timestep),
            flashlight_on: false,
            orbits: Vec::new(),
            attached_spots: Vec::new(),
            config,
        }
    }

    /// Builds the demo scene from the configured asset directory
    ///
    /// Missing textures fall back to flat colour and a missing model
    /// directory leaves the scene without models.
    ///
    /// # Errors
    /// [`TextureError::UnitsExhausted`] when the texture-unit pool is too small
    pub fn demo(config: RenderConfig, aspect: f32) -> Result<Scene, TextureError> {
        let mut images = FileImageLoader::default();
        Self::demo_with(config, aspect, &mut images, &ObjImporter)
    }

    /// [`Scene::demo`] with explicit image and model collaborators
    pub fn demo_with(
        config: RenderConfig,
        aspect: f32,
        images: &mut dyn ImageLoader,
        importer: &dyn ModelImporter,
    ) -> Result<Scene, TextureError> {
        let mut scene = Self::new(config, aspect);
        scene.add_demo_lights();
        scene.add_demo_meshes(images)?;

        let model_dir = scene.config.model_dir();
        for path in find_models(&model_dir) {
            let model = scene.load_model(&path, images, importer)?;
            let offset = MODEL_SPACING * scene.models.len() as f32;
            model.set_position(&mut scene.transforms, Vector3::new(offset, 0.0, 0.0));
            scene.models.push(model);
        }

        log::info!(
            "demo scene: {} meshes, {} models, {} lights, {} texture units",
            scene.meshes.len(),
            scene.models.len(),
            scene.lights.len(),
            scene.units.allocated()
        );
        Ok(scene)
    }

    fn add_demo_lights(&mut self) {
        let black = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let white = Vector4::new(1.0, 1.0, 1.0, 1.0);
        let red = Vector4::new(0.8, 0.0, 0.0, 1.0);
        let min_illumination = 0.001;

        self.add_light(DirectionalLight::new(PhongColors::new(black, white, white), Vector3::new(0.0, -1.0, -1.0)));
        self.add_light(PointLight::new(
            PhongColors::new(black, red, white),
            Vector3::new(10.2, 13.0, 10.0),
            Attenuation::new(20.0, min_illumination),
        ));
        self.add_light(PointLight::new(
            PhongColors::new(black, white, white),
            Vector3::new(0.0, 2.0, 0.0),
            Attenuation::new(10.0, min_illumination),
        ));

        let flashlight = SpotLight::new(
            PhongColors::new(black, white, white),
            self.camera.position(&self.transforms),
            self.camera.forward(&self.transforms),
            Deg(10.0),
            Deg(14.0),
        );
        self.attached_spots.push(self.lights.len());
        self.add_light(flashlight);
    }

    fn add_demo_meshes(&mut self, images: &mut dyn ImageLoader) -> Result<(), TextureError> {
        let texture_dir = self.config.texture_dir();

        let crate_map = self.textures.get_or_load(
            "container2.png",
            &texture_dir.join("container2.png"),
            TextureKind::Diffuse,
            SamplerOptions::default(),
            images,
            &mut self.units,
        )?;
        let crate_material = Material::new("crate").with_shininess(200.0).with_diffuse_map(crate_map);
        let cube = generate_cube();
        for i in 0..CUBE_COUNT {
            let position = Vector3::new(i as f32 * 2.0 - 4.0, 0.5, 2.0);
            let mesh = Mesh::from_geometry(
                format!("crate_{}", i),
                &cube,
                crate_material.clone(),
                &mut self.transforms,
                Transform::from_position(position),
            );
            self.meshes.push(mesh);
        }

        let floor_map = self.textures.get_or_load(
            "wood_floor.jpg",
            &texture_dir.join("wood_floor.jpg"),
            TextureKind::Diffuse,
            SamplerOptions::default().with_wrap(TextureWrap::Repeat),
            images,
            &mut self.units,
        )?;
        let floor_material = Material::new("floor").with_shininess(32.0).with_diffuse_map(floor_map);
        let floor = Mesh::from_geometry(
            "floor",
            &generate_plane(20.0, 20.0, 1, 1, 10.0),
            floor_material,
            &mut self.transforms,
            Transform::default(),
        );
        self.meshes.push(floor);
        Ok(())
    }

    /// Imports a model into this scene's transform arena and unit pool
    pub fn load_model(
        &mut self,
        path: &Path,
        images: &mut dyn ImageLoader,
        importer: &dyn ModelImporter,
    ) -> Result<Model, TextureError> {
        let mut loader = ModelLoader {
            transforms: &mut self.transforms,
            images,
            units: &mut self.units,
        };
        Model::load(path, importer, &mut loader)
    }

    /// Drops the model at `index` and frees its transforms. Texture units
    /// stay allocated.
    pub fn remove_model(&mut self, index: usize) -> bool {
        if index >= self.models.len() {
            return false;
        }
        let model = self.models.remove(index);
        log::debug!("removing model '{}'", model.name());
        model.release(&mut self.transforms);
        true
    }

    /// Adds a light; point lights orbit around the position they start at.
    pub fn add_light(&mut self, light: impl Into<Light>) {
        let light = light.into();
        if let Some(point) = light.as_point() {
            self.orbits.push((self.lights.len(), point.position.truncate()));
        }
        self.lights.push(light);
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn units(&self) -> &TextureUnitAllocator {
        &self.units
    }

    pub fn is_flashlight_on(&self) -> bool {
        self.flashlight_on
    }

    pub fn set_flashlight(&mut self, on: bool) {
        self.flashlight_on = on;
    }

    /// Simulation time in seconds
    pub fn elapsed(&self) -> f64 {
        self.timestep.elapsed()
    }

    /// Sends textures and geometry to `device`.
    pub fn upload(&mut self, device: &mut dyn RenderDevice) {
        self.textures.upload_all(device);
        for mesh in &mut self.meshes {
            mesh.upload(device);
        }
        for model in &mut self.models {
            model.upload(device);
        }
    }

    /// Advances the scene by one frame
    ///
    /// `frame_time` is drained in fixed steps. Only the first step of a frame
    /// sees the mouse delta and key presses; later steps see held input only.
    ///
    /// # Arguments
    /// * `frame_time` - Wall-clock seconds since the previous frame
    /// * `input` - Input snapshot for this frame
    pub fn update(&mut self, frame_time: f32, input: &InputState) {
        if input.key_pressed(FLASHLIGHT_KEY) {
            self.flashlight_on = !self.flashlight_on;
            log::info!("flashlight {}", if self.flashlight_on { "on" } else { "off" });
        }

        let steps = self.timestep.advance(frame_time);
        if steps == 0 {
            return;
        }
        let dt = self.timestep.step();
        let held = input.held_only();
        // Elapsed time has already moved past all of this frame's steps
        let first = self.timestep.elapsed() - f64::from(dt) * f64::from(steps - 1);
        for step in 0..steps {
            let input = if step == 0 { input } else { &held };
            self.fixed_update(dt, input, first + f64::from(dt) * f64::from(step));
        }
    }

    /// One simulation step at time `time`
    fn fixed_update(&mut self, dt: f32, input: &InputState, time: f64) {
        self.camera.update(dt, input, &mut self.transforms);

        let t = time as f32;
        if self.config.orbit_point_lights {
            for &(index, start) in &self.orbits {
                if let Some(point) = self.lights.get_mut(index).and_then(Light::as_point_mut) {
                    let offset = Vector3::new(t.cos() * ORBIT_RADIUS, 0.0, t.sin() * ORBIT_RADIUS);
                    point.set_position(start + offset);
                }
            }
        }

        let eye = self.camera.position(&self.transforms);
        let facing = self.camera.forward(&self.transforms);
        for &index in &self.attached_spots {
            if let Some(spot) = self.lights.get_mut(index).and_then(Light::as_spot_mut) {
                spot.set_position(eye);
                spot.set_spot_dir(facing);
            }
        }

        let spin = Vector3::new(0.0, Rad::from(Deg(t)).0 * MODEL_SPIN, 0.0);
        for model in &self.models {
            model.set_rotation(&mut self.transforms, spin);
        }
    }

    /// Draws every mesh and then every model.
    pub fn render(&mut self, device: &mut dyn RenderDevice) {
        let frame = FrameContext::from_camera(
            &self.camera,
            &self.transforms,
            &self.lights,
            self.config.global_ambient,
        );
        let mut programs = self.programs.forward(&self.config, self.flashlight_on);

        for mesh in &self.meshes {
            mesh.draw(device, &frame, &mut programs);
        }
        for model in &self.models {
            model.draw(device, &frame, &mut programs);
        }
    }

    /// Updates the camera aspect ratio. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    pub fn set_uniform_miss_logging(&mut self, enabled: bool) {
        self.config.log_uniform_misses = enabled;
        for program in self.programs.iter_mut() {
            program.set_miss_logging(enabled);
        }
    }
}

/// OBJ files directly in `dir` or one level below it, sorted by path
fn find_models(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::info!("no model directory at {}", dir.display());
        return Vec::new();
    };

    let mut found = Vec::new();
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            if let Ok(inner) = std::fs::read_dir(&path) {
                found.extend(inner.flatten().map(|entry| entry.path()).filter(|p| is_obj(p)));
            }
        } else if is_obj(&path) {
            found.push(path);
        }
    }
    found.sort();
    found
}

fn is_obj(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"))
}
