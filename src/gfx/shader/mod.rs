//! # Shader programs
//!
//! [`ShaderProgram`] is the uniform binder: named setters write into a CPU
//! staging block laid out from WGSL reflection, and the render device copies
//! that block into GPU memory at each draw.

pub mod program;
pub mod reflection;
pub mod source;

pub use program::{ProgramId, ShaderProgram, ShaderStage};
pub use reflection::{TextureSlot, UniformLayout, UniformSlot, UniformType, UniformView};
