//! Free-fly camera
//!
//! Right mouse button gates all control: while it is held, W/S move along the
//! camera's forward vector, A/D strafe along its left vector and mouse motion
//! turns the view. Pitch is clamped to +/-70 degrees.

use cgmath::{perspective, Deg, Matrix4, Point3, Rad, Vector3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use super::camera_utils::OPENGL_TO_WGPU_MATRIX;
use crate::gfx::transform::{Transform, TransformId, Transforms};
use crate::input::InputState;

const PITCH_LIMIT: f32 = 70.0;

#[derive(Debug, Clone)]
pub struct Camera {
    transform: TransformId,
    fovy: Deg<f32>,
    aspect: f32,
    znear: f32,
    zfar: f32,
    projection: Matrix4<f32>,
    /// Translation speed in units per second
    pub move_speed: f32,
    /// Degrees of turn per unit of mouse motion per second
    pub rotation_speed: f32,
    /// Degrees
    pitch: f32,
    /// Degrees
    yaw: f32,
}

impl Camera {
    /// Creates a camera and inserts its transform into `transforms`
    ///
    /// Pitch and yaw are seeded from the transform's rotation so that an
    /// initial tilt survives the first mouse update.
    ///
    /// # Arguments
    /// * `transforms` - Arena that will own the camera transform
    /// * `transform` - Initial placement
    /// * `fovy` - Vertical field of view
    /// * `aspect` - Viewport width over height
    /// * `znear`, `zfar` - Clip plane distances
    pub fn new(
        transforms: &mut Transforms,
        transform: Transform,
        fovy: Deg<f32>,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        let rotation = transform.rotation();
        let pitch = Deg::from(Rad(rotation.x)).0;
        let yaw = -Deg::from(Rad(rotation.y)).0;

        let mut camera = Self {
            transform: transforms.insert(transform),
            fovy,
            aspect,
            znear,
            zfar,
            projection: Matrix4::from_scale(1.0),
            move_speed: 10.0,
            rotation_speed: 10.0,
            pitch,
            yaw,
        };
        camera.set_projection(fovy, aspect, znear, zfar);
        camera
    }

    pub fn transform(&self) -> TransformId {
        self.transform
    }

    pub fn set_projection(&mut self, fovy: Deg<f32>, aspect: f32, znear: f32, zfar: f32) {
        self.fovy = fovy;
        self.aspect = aspect;
        self.znear = znear;
        self.zfar = zfar;
        self.projection = OPENGL_TO_WGPU_MATRIX * perspective(fovy, aspect, znear, zfar);
    }

    /// Rebuilds the projection for a new viewport aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.set_projection(self.fovy, aspect, self.znear, self.zfar);
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn pitch(&self) -> Deg<f32> {
        Deg(self.pitch)
    }

    pub fn yaw(&self) -> Deg<f32> {
        Deg(self.yaw)
    }

    pub fn position(&self, transforms: &Transforms) -> Vector3<f32> {
        transforms.global_position(self.transform)
    }

    pub fn forward(&self, transforms: &Transforms) -> Vector3<f32> {
        transforms
            .get(self.transform)
            .map(Transform::forward)
            .unwrap_or_else(Vector3::unit_z)
    }

    /// View matrix looking from the camera position along its forward vector,
    /// with world +Y as up.
    pub fn calculate_view(&self, transforms: &Transforms) -> Matrix4<f32> {
        let eye = self.position(transforms);
        let target = eye + self.forward(transforms);
        Matrix4::look_at_rh(
            Point3::new(eye.x, eye.y, eye.z),
            Point3::new(target.x, target.y, target.z),
            Vector3::unit_y(),
        )
    }

    pub fn calculate_projection_view(&self, transforms: &Transforms) -> Matrix4<f32> {
        self.projection * self.calculate_view(transforms)
    }

    /// Applies one step of fly controls.
    pub fn update(&mut self, dt: f32, input: &InputState, transforms: &mut Transforms) {
        if !input.mouse_down(MouseButton::Right) {
            return;
        }
        let Some(mut transform) = transforms.get_mut(self.transform) else {
            log::warn!("camera transform no longer exists");
            return;
        };

        let step = self.move_speed * dt;
        if input.key_down(KeyCode::KeyW) {
            let forward = transform.forward();
            transform.translate(forward * step);
        }
        if input.key_down(KeyCode::KeyS) {
            let forward = transform.forward();
            transform.translate(-forward * step);
        }
        if input.key_down(KeyCode::KeyA) {
            let left = transform.left();
            transform.translate(left * step);
        }
        if input.key_down(KeyCode::KeyD) {
            let left = transform.left();
            transform.translate(-left * step);
        }

        let delta = input.mouse_delta();
        self.pitch += delta.y * dt * self.rotation_speed;
        self.yaw += delta.x * dt * self.rotation_speed;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        transform.set_rotation(Vector3::new(
            Rad::from(Deg(self.pitch)).0,
            Rad::from(Deg(-self.yaw)).0,
            0.0,
        ));
    }
}
