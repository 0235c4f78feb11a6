//! Shader source loading
//!
//! The forward programs ship embedded in the binary; the same files can be
//! loaded from disk for iteration without a rebuild.

use std::path::Path;

use crate::error::AssetError;

pub const FORWARD_VERTEX: &str = include_str!("shaders/forward_vertex.wgsl");
pub const FORWARD_HEADER: &str = include_str!("shaders/forward_header.wgsl");
pub const FORWARD_AMBIENT: &str = include_str!("shaders/forward_ambient.wgsl");
pub const FORWARD_DIRECTIONAL: &str = include_str!("shaders/forward_directional.wgsl");
pub const FORWARD_POINT: &str = include_str!("shaders/forward_point.wgsl");
pub const FORWARD_SPOT: &str = include_str!("shaders/forward_spot.wgsl");

pub fn read_source(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Prepends `header` to `source`, separated by a newline.
pub fn with_header(header: Option<&str>, source: &str) -> String {
    match header {
        Some(header) => format!("{}\n{}", header, source),
        None => source.to_owned(),
    }
}
