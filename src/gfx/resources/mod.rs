//! CPU and GPU resources
//!
//! Materials, textures with their unit pool and cache, and the wgpu texture
//! objects created from them.

pub mod material;
pub mod texture;
pub mod texture_resource;

pub use material::Material;
pub use texture::{
    DecodedImage, FileImageLoader, ImageLoader, PixelFormat, SamplerOptions, Texture,
    TextureCache, TextureFilter, TextureKind, TextureRef, TextureUnit, TextureUnitAllocator,
    TextureWrap,
};
pub use texture_resource::TextureResource;
