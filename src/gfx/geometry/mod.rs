//! # Procedural Geometry Generation
//!
//! Generators for the shapes the demo scene needs without model files.
//!
//! ## Supported Primitives
//!
//! - **Cube**: unit cube, one quad per face
//! - **Plane**: horizontal XZ plane with configurable size and UV tiling
//!
//! ## Usage
//!
//! ```rust
//! use tallow::gfx::geometry::{generate_cube, generate_plane};
//!
//! let cube = generate_cube();
//! let floor = generate_plane(20.0, 20.0, 1, 1, 8.0);
//! let (vertices, indices) = (floor.to_vertices(), floor.indices.clone());
//! assert_eq!(cube.triangle_count(), 12);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::gfx::scene::import::{compute_tangents, tangent_with_handedness};
use crate::gfx::scene::vertex::Vertex3D;

/// Represents generated geometry data ready for GPU upload
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the attributes into renderer vertices, deriving tangents from the UVs.
    pub fn to_vertices(&self) -> Vec<Vertex3D> {
        let (tangents, bitangents) = compute_tangents(&self.vertices, &self.tex_coords, &self.indices);

        (0..self.vertices.len())
            .map(|i| {
                let normal = self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
                Vertex3D {
                    position: self.vertices[i],
                    tex_coord: self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                    normal,
                    tangent: tangent_with_handedness(normal, tangents[i], bitangents[i]),
                }
            })
            .collect()
    }
}
