//! # Graphics Module
//!
//! Everything between the scene description and the GPU.
//!
//! ## Architecture Overview
//!
//! - **Transforms** ([`transform`]) - Arena of parented position/rotation/scale nodes
//! - **Camera** ([`camera`]) - Free-fly perspective camera
//! - **Lighting** ([`lighting`]) - Directional, point and spot Phong lights
//! - **Resources** ([`resources`]) - Materials, textures and the texture-unit pool
//! - **Shaders** ([`shader`]) - WGSL programs with reflected, name-addressed uniforms
//! - **Rendering** ([`rendering`]) - Multi-pass forward renderer over a [`RenderDevice`]
//! - **Scene** ([`scene`]) - Meshes, models and the per-frame loop
//!
//! Control flows from the [`Scene`] to each drawable, which writes uniforms
//! into its programs and issues draws on the device. [`RenderEngine`] owns
//! the window surface and replays those draws on the GPU.
//!
//! [`RenderDevice`]: rendering::RenderDevice
//! [`Scene`]: scene::Scene

pub mod camera;
pub mod geometry;
pub mod lighting;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod transform;

// Re-export commonly used types
pub use camera::Camera;
pub use rendering::render_engine::RenderEngine;
pub use scene::Scene;
pub use transform::{Transform, TransformId, Transforms};
