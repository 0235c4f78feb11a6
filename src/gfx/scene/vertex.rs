//! # Vertex Data Structures
//!
//! GPU vertex format shared by every mesh and every forward program.

/// A 3D vertex with position, texture coordinate, normal and tangent.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute ensures the struct has a C-compatible memory
/// layout, which is required for GPU buffer operations. The stride is
/// 48 bytes.
///
/// # Fields
///
/// - `position`: 3D position coordinates [x, y, z]
/// - `tex_coord`: texture coordinate [u, v], origin at the bottom left
/// - `normal`: 3D normal vector [nx, ny, nz] for lighting calculations
/// - `tangent`: tangent [tx, ty, tz] with handedness in `w` (+1 or -1)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
}

impl Vertex3D {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3,
        3 => Float32x4
    ];

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// # Returns
    ///
    /// A [`wgpu::VertexBufferLayout`] that describes:
    /// - Attribute 0: Position (Float32x3) at shader location 0
    /// - Attribute 1: Texture coordinate (Float32x2) at shader location 1
    /// - Attribute 2: Normal (Float32x3) at shader location 2
    /// - Attribute 3: Tangent (Float32x4) at shader location 3
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
