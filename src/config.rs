//! Renderer configuration
//!
//! Compile-time defaults for the demo scene, with a handful of environment
//! overrides for things worth flipping without a rebuild.

use std::path::PathBuf;

use cgmath::Vector4;

/// Runtime switches for the renderer and demo scene
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Initial window size in logical pixels
    pub window_size: (u32, u32),
    /// Framebuffer clear colour
    pub clear_color: [f64; 4],
    /// Ambient term multiplied into every material's ambient colour
    pub global_ambient: Vector4<f32>,
    /// Simulation step for the fixed-timestep accumulator, in seconds
    pub fixed_timestep: f32,
    /// Size of the texture-unit pool
    pub max_texture_units: u32,
    /// Log uniform names that fail to resolve against a program
    pub log_uniform_misses: bool,
    /// Root directory for textures and models
    pub asset_dir: PathBuf,
    pub enable_directional: bool,
    pub enable_point: bool,
    pub enable_spot: bool,
    /// Orbit point lights around their starting position
    pub orbit_point_lights: bool,
    pub vsync: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_size: (1200, 800),
            clear_color: [0.2, 0.2, 0.25, 1.0],
            global_ambient: Vector4::new(0.01, 0.01, 0.01, 1.0),
            fixed_timestep: 0.01,
            max_texture_units: 32,
            log_uniform_misses: false,
            asset_dir: PathBuf::from("assets"),
            enable_directional: true,
            enable_point: true,
            enable_spot: true,
            orbit_point_lights: true,
            vsync: false,
        }
    }
}

impl RenderConfig {
    /// Default configuration with environment overrides applied
    ///
    /// Recognised variables:
    /// * `TALLOW_LOG_UNIFORM_MISSES` - any value enables uniform miss logging
    /// * `TALLOW_ASSET_DIR` - asset root directory
    /// * `TALLOW_VSYNC` - any value enables vsync
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if std::env::var("TALLOW_LOG_UNIFORM_MISSES").is_ok() {
            config.log_uniform_misses = true;
        }
        if let Ok(dir) = std::env::var("TALLOW_ASSET_DIR") {
            config.asset_dir = PathBuf::from(dir);
        }
        if std::env::var("TALLOW_VSYNC").is_ok() {
            config.vsync = true;
        }

        log::debug!("render config: {:?}", config);
        config
    }

    pub fn texture_dir(&self) -> PathBuf {
        self.asset_dir.join("textures")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.asset_dir.join("models")
    }
}
