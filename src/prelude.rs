//! # Tallow Prelude
//!
//! Commonly used types in one import.
//!
//! ```no_run
//! use tallow::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(LoggingConfig::default());
//!
//!     let mut scene = Scene::new(RenderConfig::default(), 1.0);
//!     scene.add_light(DirectionalLight::new(PhongColors::default(), Vector3::new(0.0, -1.0, 0.0)));
//!
//!     let cube = Mesh::from_geometry(
//!         "cube",
//!         &generate_cube(),
//!         Material::new("plain"),
//!         &mut scene.transforms,
//!         Transform::default(),
//!     );
//!     scene.meshes.push(cube);
//!
//!     let mut device = HeadlessDevice::new();
//!     scene.upload(&mut device);
//!     scene.render(&mut device);
//!     Ok(())
//! }
//! ```

// Re-export core application types
pub use crate::app::TallowApp;
pub use crate::config::RenderConfig;
pub use crate::default;
pub use crate::error::{AssetError, ShaderError, TextureError};
pub use crate::input::{InputCollector, InputState};
pub use crate::logging::{init_logging, LoggingConfig};

// Re-export graphics and scene types
pub use crate::gfx::camera::Camera;
pub use crate::gfx::geometry::{generate_cube, generate_plane, GeometryData};
pub use crate::gfx::lighting::{
    Attenuation, DirectionalLight, Light, LightKind, PhongColors, PointLight, SpotLight,
};
pub use crate::gfx::rendering::{Drawable, ForwardPrograms, FrameContext, HeadlessDevice, RenderDevice};
pub use crate::gfx::resources::{Material, SamplerOptions, TextureCache, TextureKind, TextureUnitAllocator};
pub use crate::gfx::scene::{FixedTimestep, Mesh, Model, ObjImporter, Scene};
pub use crate::gfx::shader::ShaderProgram;
pub use crate::gfx::transform::{Transform, TransformId, Transforms};

// Re-export common external dependencies
pub use cgmath::{Deg, InnerSpace, Vector3, Vector4, Zero};
