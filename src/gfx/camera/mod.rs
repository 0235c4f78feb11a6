//! # Camera
//!
//! A free-fly perspective camera bound to a transform in the scene's
//! [`Transforms`](crate::gfx::transform::Transforms) arena.

pub mod camera;
pub mod camera_utils;

pub use camera::Camera;
