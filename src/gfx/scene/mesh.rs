use crate::gfx::geometry::GeometryData;
use crate::gfx::rendering::forward::{draw_surface, Drawable, ForwardPrograms, FrameContext, Surface};
use crate::gfx::rendering::{GeometryHandle, RenderDevice};
use crate::gfx::resources::Material;
use crate::gfx::transform::{Transform, TransformId, Transforms};

use super::vertex::Vertex3D;

/// Indexed triangle list with a material and a transform
///
/// Vertex data stays on the CPU until [`Mesh::upload`]; a mesh that was never
/// uploaded draws nothing.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
    geometry: Option<GeometryHandle>,
    transform: TransformId,
    pub material: Material,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex3D>,
        indices: Vec<u32>,
        material: Material,
        transform: TransformId,
    ) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            geometry: None,
            transform,
            material,
        }
    }

    /// Builds a mesh from procedural geometry, inserting `transform` into the arena.
    pub fn from_geometry(
        name: impl Into<String>,
        data: &GeometryData,
        material: Material,
        transforms: &mut Transforms,
        transform: Transform,
    ) -> Self {
        let transform = transforms.insert(transform);
        Self::new(name, data.to_vertices(), data.indices.clone(), material, transform)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn transform(&self) -> TransformId {
        self.transform
    }

    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    pub fn is_uploaded(&self) -> bool {
        self.geometry.is_some()
    }

    /// Creates the vertex and index buffers. Later calls are ignored.
    pub fn upload(&mut self, device: &mut dyn RenderDevice) {
        if self.geometry.is_none() {
            self.geometry = Some(device.upload_geometry(&self.name, &self.vertices, &self.indices));
        }
    }
}

impl Drawable for Mesh {
    fn draw(&self, device: &mut dyn RenderDevice, frame: &FrameContext<'_>, programs: &mut ForwardPrograms<'_>) {
        let Some(geometry) = self.geometry else {
            log::trace!("mesh '{}' not uploaded", self.name);
            return;
        };
        let surface = Surface {
            geometry,
            model: frame.transforms.global_matrix(self.transform),
            material: &self.material,
        };
        draw_surface(device, frame, programs, &surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::rendering::HeadlessDevice;
    use crate::gfx::shader::{source, ShaderProgram};
    use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

    fn frame<'a>(transforms: &'a Transforms) -> FrameContext<'a> {
        FrameContext {
            transforms,
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            view_position: Vector4::new(0.0, 0.0, 0.0, 1.0),
            lights: &[],
            global_ambient: Vector4::new(0.1, 0.1, 0.1, 1.0),
        }
    }

    #[test]
    fn test_not_uploaded_mesh_draws_nothing() {
        let mut transforms = Transforms::new();
        let mesh = Mesh::from_geometry("cube", &generate_cube(), Material::default(), &mut transforms, Transform::default());
        let mut ambient =
            ShaderProgram::from_sources("ambient", source::FORWARD_VERTEX, source::FORWARD_AMBIENT, None).unwrap();
        let mut device = HeadlessDevice::new();

        let mut programs = ForwardPrograms { ambient: Some(&mut ambient), ..Default::default() };
        mesh.draw(&mut device, &frame(&transforms), &mut programs);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn test_draw_uses_global_matrix() {
        let mut transforms = Transforms::new();
        let mut mesh = Mesh::from_geometry(
            "cube",
            &generate_cube(),
            Material::default(),
            &mut transforms,
            Transform::from_position(Vector3::new(1.0, 2.0, 3.0)),
        );
        let mut ambient =
            ShaderProgram::from_sources("ambient", source::FORWARD_VERTEX, source::FORWARD_AMBIENT, None).unwrap();
        let mut device = HeadlessDevice::new();
        mesh.upload(&mut device);
        mesh.upload(&mut device);

        let mut programs = ForwardPrograms { ambient: Some(&mut ambient), ..Default::default() };
        mesh.draw(&mut device, &frame(&transforms), &mut programs);

        let draw = device.draws().next().unwrap();
        assert_eq!(draw.geometry, mesh.geometry().unwrap());
        assert_eq!(
            draw.uniforms().mat4("model"),
            Some(Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(draw.uniforms().vec4("ambient"), Some(Vector4::new(0.1, 0.1, 0.1, 1.0)));
    }
}
