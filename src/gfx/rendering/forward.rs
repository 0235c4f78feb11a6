//! # Multi-pass forward lighting
//!
//! Every drawable is drawn once with the ambient program, which lays down
//! colour and depth, and then once per light with additive blending, depth
//! writes off and an equal depth test. Only the surface nearest the camera
//! survives the equal test, so the per-light passes sum to the lit colour of
//! the visible surface regardless of light order.
//!
//! Any program may be absent. A missing ambient program skips the ambient
//! pass; a missing light program skips every light of that kind.

use cgmath::{ElementWise, Matrix4, Vector4};

use super::device::{BlendMode, DepthCompare, GeometryHandle, RenderDevice};
use crate::gfx::camera::camera_utils::normal_matrix;
use crate::gfx::camera::Camera;
use crate::gfx::lighting::{Light, LightKind};
use crate::gfx::resources::Material;
use crate::gfx::shader::ShaderProgram;
use crate::gfx::transform::Transforms;

/// The four optional programs of the forward renderer
#[derive(Default)]
pub struct ForwardPrograms<'a> {
    pub ambient: Option<&'a mut ShaderProgram>,
    pub directional: Option<&'a mut ShaderProgram>,
    pub point: Option<&'a mut ShaderProgram>,
    pub spot: Option<&'a mut ShaderProgram>,
}

impl<'a> ForwardPrograms<'a> {
    pub fn has_light_programs(&self) -> bool {
        self.directional.is_some() || self.point.is_some() || self.spot.is_some()
    }

    fn for_kind(&mut self, kind: LightKind) -> Option<&mut ShaderProgram> {
        match kind {
            LightKind::Directional => self.directional.as_deref_mut(),
            LightKind::Point => self.point.as_deref_mut(),
            LightKind::Spot => self.spot.as_deref_mut(),
        }
    }
}

/// Per-frame inputs shared by every drawable
pub struct FrameContext<'a> {
    pub transforms: &'a Transforms,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    /// Camera world position, `w = 1`
    pub view_position: Vector4<f32>,
    pub lights: &'a [Light],
    pub global_ambient: Vector4<f32>,
}

impl<'a> FrameContext<'a> {
    pub fn from_camera(
        camera: &Camera,
        transforms: &'a Transforms,
        lights: &'a [Light],
        global_ambient: Vector4<f32>,
    ) -> Self {
        Self {
            transforms,
            view: camera.calculate_view(transforms),
            projection: camera.projection(),
            view_position: camera.position(transforms).extend(1.0),
            lights,
            global_ambient,
        }
    }
}

/// Anything the forward renderer can draw
pub trait Drawable {
    fn draw(&self, device: &mut dyn RenderDevice, frame: &FrameContext<'_>, programs: &mut ForwardPrograms<'_>);
}

/// One surface: uploaded geometry, its world matrix and material
pub struct Surface<'a> {
    pub geometry: GeometryHandle,
    pub model: Matrix4<f32>,
    pub material: &'a Material,
}

fn set_matrices(program: &mut ShaderProgram, frame: &FrameContext<'_>, model: Matrix4<f32>) {
    program.set_mat4("projection", frame.projection);
    program.set_mat4("view", frame.view);
    program.set_mat4("model", model);
}

/// Draws one surface with the ambient pass followed by one additive pass per light.
pub fn draw_surface(
    device: &mut dyn RenderDevice,
    frame: &FrameContext<'_>,
    programs: &mut ForwardPrograms<'_>,
    surface: &Surface<'_>,
) {
    let material = surface.material;

    if let Some(ambient) = programs.ambient.as_deref_mut() {
        set_matrices(ambient, frame, surface.model);
        ambient.set_vec4("ambient", frame.global_ambient.mul_element_wise(material.ambient_color));
        let diffuse_map = material.active_diffuse_map();
        if let Some(texture) = diffuse_map {
            ambient.set_texture("diffuseMap", texture);
        }
        ambient.set_bool("useDiffuseMap", diffuse_map.is_some());
        device.draw(ambient, surface.geometry);
    }

    if !programs.has_light_programs() {
        return;
    }

    device.set_blend_mode(BlendMode::Additive);
    device.set_depth_write(false);
    device.set_depth_compare(DepthCompare::Equal);

    let normal = normal_matrix(surface.model);
    for light in frame.lights {
        let Some(program) = programs.for_kind(light.kind()) else {
            continue;
        };

        set_matrices(program, frame, surface.model);
        program.set_mat3("normalMatrix", normal);
        program.set_vec4("viewPos", frame.view_position);
        program.set_material("material", material);

        if let Some(directional) = light.as_directional() {
            program.set_directional_light("dirLight", directional);
        } else if let Some(point) = light.as_point() {
            program.set_point_light("pointLight", point);
        } else if let Some(spot) = light.as_spot() {
            program.set_spot_light("spotLight", spot);
        }

        device.draw(program, surface.geometry);
    }

    device.set_depth_compare(DepthCompare::Less);
    device.set_depth_write(true);
    device.set_blend_mode(BlendMode::Replace);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::camera_utils::OPENGL_TO_WGPU_MATRIX;
    use crate::gfx::lighting::{Attenuation, DirectionalLight, PhongColors, PointLight, SpotLight};
    use crate::gfx::rendering::device::RenderState;
    use crate::gfx::rendering::headless::{DeviceCommand, HeadlessDevice, Shading};
    use crate::gfx::resources::{DecodedImage, SamplerOptions, Texture, TextureKind, TextureUnitAllocator};
    use crate::gfx::scene::vertex::Vertex3D;
    use crate::gfx::shader::source;
    use cgmath::{perspective, Deg, InnerSpace, Point3, Vector3};

    const SIZE: u32 = 32;

    struct Programs {
        ambient: ShaderProgram,
        directional: ShaderProgram,
        point: ShaderProgram,
        spot: ShaderProgram,
    }

    impl Programs {
        fn new(device: &mut HeadlessDevice) -> Self {
            let light = |name: &str, fragment: &str| {
                ShaderProgram::from_sources(name, source::FORWARD_VERTEX, fragment, Some(source::FORWARD_HEADER)).unwrap()
            };
            let programs = Self {
                ambient: ShaderProgram::from_sources("ambient", source::FORWARD_VERTEX, source::FORWARD_AMBIENT, None).unwrap(),
                directional: light("directional", source::FORWARD_DIRECTIONAL),
                point: light("point", source::FORWARD_POINT),
                spot: light("spot", source::FORWARD_SPOT),
            };
            device.bind_shading(&programs.ambient, Shading::Ambient);
            device.bind_shading(&programs.directional, Shading::Directional);
            device.bind_shading(&programs.point, Shading::Point);
            device.bind_shading(&programs.spot, Shading::Spot);
            programs
        }

        fn all(&mut self) -> ForwardPrograms<'_> {
            ForwardPrograms {
                ambient: Some(&mut self.ambient),
                directional: Some(&mut self.directional),
                point: Some(&mut self.point),
                spot: Some(&mut self.spot),
            }
        }
    }

    /// Camera at the origin looking down -Z
    fn frame<'a>(transforms: &'a Transforms, lights: &'a [Light], ambient: f32) -> FrameContext<'a> {
        FrameContext {
            transforms,
            view: Matrix4::look_at_rh(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0), Vector3::unit_y()),
            projection: OPENGL_TO_WGPU_MATRIX * perspective(Deg(90.0), 1.0, 0.1, 100.0),
            view_position: Vector4::new(0.0, 0.0, 0.0, 1.0),
            lights,
            global_ambient: Vector4::new(ambient, ambient, ambient, 1.0),
        }
    }

    /// Square facing +Z, counter-clockwise from the camera
    fn quad(device: &mut HeadlessDevice, z: f32, half: f32) -> GeometryHandle {
        let corner = |x: f32, y: f32, u: f32, v: f32| Vertex3D {
            position: [x, y, z],
            tex_coord: [u, v],
            normal: [0.0, 0.0, 1.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
        };
        let vertices = [
            corner(-half, -half, 0.0, 0.0),
            corner(half, -half, 1.0, 0.0),
            corner(half, half, 1.0, 1.0),
            corner(-half, half, 0.0, 1.0),
        ];
        device.upload_geometry("quad", &vertices, &[0, 1, 2, 0, 2, 3])
    }

    /// Diffuse-only white
    fn white() -> PhongColors {
        PhongColors::new(Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(1.0, 1.0, 1.0, 1.0), Vector4::new(0.0, 0.0, 0.0, 1.0))
    }

    fn white_light(direction: Vector3<f32>) -> Light {
        DirectionalLight::new(white(), direction).into()
    }

    fn center(device: &HeadlessDevice) -> [f32; 4] {
        device.framebuffer().unwrap().pixel(SIZE / 2, SIZE / 2)
    }

    #[test]
    fn test_ambient_only_issues_one_draw_and_no_state_changes() {
        let mut device = HeadlessDevice::new();
        let mut programs = Programs::new(&mut device);
        let geometry = quad(&mut device, -5.0, 1.0);
        let transforms = Transforms::new();
        let lights = [white_light(Vector3::new(0.0, 0.0, -1.0))];
        let material = Material::default();

        let mut passes = ForwardPrograms {
            ambient: Some(&mut programs.ambient),
            ..Default::default()
        };
        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
        draw_surface(&mut device, &frame(&transforms, &lights, 0.1), &mut passes, &surface);

        assert_eq!(device.draw_count(), 1);
        assert_eq!(device.state_change_count(), 0);
        assert_eq!(device.render_state(), RenderState::default());
    }

    #[test]
    fn test_light_passes_restore_state_and_skip_missing_programs() {
        let mut device = HeadlessDevice::new();
        let mut programs = Programs::new(&mut device);
        let geometry = quad(&mut device, -5.0, 1.0);
        let transforms = Transforms::new();
        let lights = [
            white_light(Vector3::new(0.0, 0.0, -1.0)),
            PointLight::new(PhongColors::default(), Vector3::new(0.0, 0.0, -2.0), Attenuation::new(10.0, 0.001)).into(),
        ];
        let material = Material::default();

        let mut passes = ForwardPrograms {
            ambient: Some(&mut programs.ambient),
            directional: Some(&mut programs.directional),
            ..Default::default()
        };
        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
        draw_surface(&mut device, &frame(&transforms, &lights, 0.1), &mut passes, &surface);

        // Ambient plus the directional light; the point light has no program
        assert_eq!(device.draw_count(), 2);
        let light_draw = device.draws().nth(1).unwrap();
        assert_eq!(light_draw.state.blend, BlendMode::Additive);
        assert_eq!(light_draw.state.depth_compare, DepthCompare::Equal);
        assert!(!light_draw.state.depth_write);
        assert_eq!(device.render_state(), RenderState::default());

        assert!(matches!(
            device.commands().first(),
            Some(DeviceCommand::Draw(record)) if record.program == programs.ambient.id()
        ));
    }

    #[test]
    fn test_light_order_does_not_change_the_image() {
        let render = |lights: &[Light]| {
            let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
            let mut programs = Programs::new(&mut device);
            let geometry = quad(&mut device, -5.0, 4.0);
            let transforms = Transforms::new();
            let material = Material::default().with_shininess(8.0);
            let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
            draw_surface(&mut device, &frame(&transforms, lights, 0.05), &mut programs.all(), &surface);
            device.framebuffer().unwrap().pixels().to_vec()
        };

        let a = white_light(Vector3::new(0.3, -0.2, -1.0));
        let b: Light = PointLight::new(
            PhongColors::new(Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(0.2, 0.4, 0.1, 1.0), Vector4::new(0.1, 0.1, 0.1, 1.0)),
            Vector3::new(1.0, 1.0, -3.0),
            Attenuation::new(10.0, 0.001),
        )
        .into();

        let forward = render(&[a.clone(), b.clone()]);
        let reversed = render(&[b, a]);
        for (lhs, rhs) in forward.iter().zip(&reversed) {
            for channel in 0..4 {
                assert!((lhs[channel] - rhs[channel]).abs() < 1e-5);
            }
        }
        assert!(forward.iter().any(|pixel| pixel[0] > 0.1));
    }

    #[test]
    fn test_farther_surface_gets_no_light() {
        let lights = [white_light(Vector3::new(0.0, 0.0, -1.0))];
        let near_material = Material::default().with_diffuse(Vector4::new(0.5, 0.5, 0.5, 1.0));
        let far_material = Material::default().with_diffuse(Vector4::new(0.0, 1.0, 0.0, 1.0));

        let render = |order: &[bool]| {
            let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
            let mut programs = Programs::new(&mut device);
            let near = quad(&mut device, -3.0, 1.0);
            let far = quad(&mut device, -6.0, 4.0);
            let transforms = Transforms::new();
            let context = frame(&transforms, &lights, 0.0);
            for &is_near in order {
                let surface = if is_near {
                    Surface { geometry: near, model: Matrix4::from_scale(1.0), material: &near_material }
                } else {
                    Surface { geometry: far, model: Matrix4::from_scale(1.0), material: &far_material }
                };
                draw_surface(&mut device, &context, &mut programs.all(), &surface);
            }
            center(&device)
        };

        let near_alone = render(&[true]);
        assert!((near_alone[0] - 0.5).abs() < 1e-5);
        assert_eq!(render(&[true, false]), near_alone);
        assert_eq!(render(&[false, true]), near_alone);
    }

    #[test]
    fn test_ambient_plus_directional_scenario() {
        let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
        let mut programs = Programs::new(&mut device);
        let geometry = quad(&mut device, -5.0, 4.0);
        let transforms = Transforms::new();
        let cast_dir = Vector3::new(0.0, -1.0, -1.0);
        let lights = [white_light(cast_dir)];
        let material = Material::default().with_ambient(Vector4::new(0.01, 0.01, 0.01, 1.0));

        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
        draw_surface(&mut device, &frame(&transforms, &lights, 0.01), &mut programs.all(), &surface);

        let n_dot_l = Vector3::unit_z().dot(-cast_dir.normalize()).max(0.0);
        let expected = 0.01 * 0.01 + n_dot_l;
        let pixel = center(&device);
        for channel in &pixel[..3] {
            assert!((channel - expected).abs() < 1e-4, "{} vs {}", channel, expected);
        }
    }

    #[test]
    fn test_spot_light_lights_only_inside_its_cone() {
        let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
        let mut programs = Programs::new(&mut device);
        let geometry = quad(&mut device, -5.0, 6.0);
        let transforms = Transforms::new();
        let lights: [Light; 1] = [SpotLight::new(
            white(),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Deg(10.0),
            Deg(14.0),
        )
        .into()];
        let material = Material::default();

        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
        draw_surface(&mut device, &frame(&transforms, &lights, 0.0), &mut programs.all(), &surface);

        assert_eq!(device.draw_count(), 2);
        let inside = center(&device);
        assert!(inside[0] > 0.95, "cone centre {:?}", inside);
        // About 50 degrees off the axis
        let outside = device.framebuffer().unwrap().pixel(2, 2);
        for channel in &outside[..3] {
            assert!(channel.abs() < 1e-6, "outside the cone {:?}", outside);
        }
    }

    #[test]
    fn test_point_light_dims_with_distance() {
        let attenuation = Attenuation::new(10.0, 0.001);
        let render = |z: f32| {
            let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
            let mut programs = Programs::new(&mut device);
            let geometry = quad(&mut device, z, 1.0);
            let transforms = Transforms::new();
            let lights: [Light; 1] = [PointLight::new(white(), Vector3::new(0.0, 0.0, 0.0), attenuation).into()];
            let material = Material::default();
            let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &material };
            draw_surface(&mut device, &frame(&transforms, &lights, 0.0), &mut programs.all(), &surface);
            center(&device)[0]
        };

        let near = render(-2.0);
        let far = render(-6.0);
        assert!(far > 0.0);
        assert!(near > far, "{} should be brighter than {}", near, far);
        assert!((near - attenuation.factor(2.0)).abs() < 1e-2);
        assert!((far - attenuation.factor(6.0)).abs() < 1e-2);
    }

    #[test]
    fn test_normal_map_changes_the_shaded_result() {
        let mut device = HeadlessDevice::with_target(SIZE, SIZE, [0.0, 0.0, 0.0, 1.0]);
        let mut programs = Programs::new(&mut device);
        let geometry = quad(&mut device, -5.0, 1.0);
        let transforms = Transforms::new();
        let lights = [white_light(Vector3::new(0.0, 0.0, -1.0))];
        let context = frame(&transforms, &lights, 0.0);

        // Tangent-space normal leaning 45 degrees towards the tangent
        let mut units = TextureUnitAllocator::new(4);
        let texture = Texture::from_image(
            "tilted.png",
            TextureKind::Normal,
            DecodedImage::solid(1, 1, [218, 128, 218, 255]),
            SamplerOptions::default(),
            &mut units,
        )
        .unwrap();
        texture.upload(&mut device);
        assert!(device.is_texture_uploaded(texture.handle().unit()));

        let flat = Material::default();
        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &flat };
        draw_surface(&mut device, &context, &mut programs.all(), &surface);
        let flat_pixel = center(&device);

        device.clear_target([0.0, 0.0, 0.0, 1.0]);
        let mapped = Material::default().with_normal_map(Some(texture.handle()));
        let surface = Surface { geometry, model: Matrix4::from_scale(1.0), material: &mapped };
        draw_surface(&mut device, &context, &mut programs.all(), &surface);
        let mapped_pixel = center(&device);

        assert!((flat_pixel[0] - 1.0).abs() < 1e-4);
        assert!((mapped_pixel[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-2, "{:?}", mapped_pixel);
    }
}
