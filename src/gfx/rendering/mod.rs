// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! The forward multi-pass protocol, the [`RenderDevice`] seam it draws
//! through, and the two devices behind it: wgpu for the window and a
//! headless rasteriser for tests.

pub mod device;
pub mod forward;
pub mod headless;
pub mod pipeline_manager;
pub mod render_engine;
pub mod wgpu_device;

// Re-export main types
pub use device::{BlendMode, DepthCompare, GeometryHandle, RenderDevice, RenderState};
pub use forward::{draw_surface, Drawable, ForwardPrograms, FrameContext, Surface};
pub use headless::HeadlessDevice;
pub use pipeline_manager::{PipelineConfig, PipelineManager, PipelineStats};
pub use render_engine::RenderEngine;
pub use wgpu_device::WgpuDevice;
