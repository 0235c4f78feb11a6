//! # Scene
//!
//! Drawables and the scene that owns them.
//!
//! ## Key Components
//!
//! - [`Mesh`] - Indexed triangles with a material and a transform
//! - [`Model`] - Meshes imported from a model file, parented to one root transform
//! - [`ObjImporter`] - Reads OBJ/MTL files into an [`ImportedScene`]
//! - [`FixedTimestep`] - Accumulator driving the simulation in fixed steps
//! - [`Scene`] - Camera, lights, drawables and the per-frame update/render
//! - [`Vertex3D`] - Vertex layout shared by every program
//!
//! ## Usage
//!
//! ```no_run
//! use tallow::config::RenderConfig;
//! use tallow::gfx::rendering::HeadlessDevice;
//! use tallow::gfx::scene::Scene;
//! use tallow::input::InputState;
//!
//! let mut scene = Scene::demo(RenderConfig::default(), 16.0 / 9.0)?;
//! let mut device = HeadlessDevice::new();
//! scene.upload(&mut device);
//! scene.update(1.0 / 60.0, &InputState::default());
//! scene.render(&mut device);
//! # Ok::<(), tallow::error::TextureError>(())
//! ```

pub mod import;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod timestep;
pub mod vertex;

pub use import::{ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, ModelImporter, ObjImporter};
pub use mesh::Mesh;
pub use model::{Model, ModelLoader};
pub use scene::{Scene, ScenePrograms};
pub use timestep::FixedTimestep;
pub use vertex::Vertex3D;
