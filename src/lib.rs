// src/lib.rs
//! Tallow
//!
//! A real-time forward renderer built on wgpu and winit. Every drawable is
//! drawn once for ambient light and once more per light source, with the light
//! passes blended additively onto the visible surface.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod input;
pub mod logging;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::TallowApp;

/// Creates the demo application, configured from the environment
///
/// # Errors
/// Fails if the platform event loop cannot be created
pub fn default() -> anyhow::Result<TallowApp> {
    TallowApp::new(config::RenderConfig::from_env())
}
