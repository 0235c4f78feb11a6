use cgmath::{Deg, InnerSpace, Vector3, Vector4, Zero};

/// Ambient, diffuse and specular intensities shared by every light kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhongColors {
    pub ambient: Vector4<f32>,
    pub diffuse: Vector4<f32>,
    pub specular: Vector4<f32>,
}

impl Default for PhongColors {
    fn default() -> Self {
        let one = Vector4::new(1.0, 1.0, 1.0, 1.0);
        Self {
            ambient: one,
            diffuse: one,
            specular: one,
        }
    }
}

impl PhongColors {
    pub fn new(ambient: Vector4<f32>, diffuse: Vector4<f32>, specular: Vector4<f32>) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
        }
    }
}

/// Light arriving from a single direction with no falloff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub colors: PhongColors,
    /// Direction the light travels in; kept unit length
    cast_dir: Vector4<f32>,
}

impl DirectionalLight {
    pub fn new(colors: PhongColors, cast_dir: Vector3<f32>) -> Self {
        let mut light = Self {
            colors,
            cast_dir: Vector4::zero(),
        };
        light.set_cast_dir(cast_dir);
        light
    }

    pub fn cast_dir(&self) -> Vector4<f32> {
        self.cast_dir
    }

    pub fn set_cast_dir(&mut self, dir: Vector3<f32>) {
        self.cast_dir = unit(dir).extend(0.0);
    }
}

/// Distance falloff of a point light
///
/// The raw factor is `1 / (1 + d / radius)^2`. It is then rescaled so that it
/// reaches exactly zero where it would fall below `min_illumination`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub illumination_radius: f32,
    pub min_illumination: f32,
}

impl Attenuation {
    pub fn new(illumination_radius: f32, min_illumination: f32) -> Self {
        Self {
            illumination_radius,
            min_illumination,
        }
    }

    /// Attenuation at `distance`, matching the point-light fragment shader.
    pub fn factor(&self, distance: f32) -> f32 {
        let falloff = 1.0 + distance / self.illumination_radius.max(f32::MIN_POSITIVE);
        let raw = 1.0 / (falloff * falloff);
        let range = (1.0 - self.min_illumination).max(1e-6);
        ((raw - self.min_illumination) / range).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub colors: PhongColors,
    /// World position, `w = 1`
    pub position: Vector4<f32>,
    pub attenuation: Attenuation,
}

impl PointLight {
    pub fn new(colors: PhongColors, position: Vector3<f32>, attenuation: Attenuation) -> Self {
        Self {
            colors,
            position: position.extend(1.0),
            attenuation,
        }
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position.extend(1.0);
    }
}

/// Cone light with a smooth edge between the inner and outer angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub colors: PhongColors,
    position: Vector4<f32>,
    spot_dir: Vector4<f32>,
    inner_cosine: f32,
    outer_cosine: f32,
}

impl SpotLight {
    /// Creates a spot light
    ///
    /// # Arguments
    /// * `colors` - Phong intensities
    /// * `position` - World position of the cone apex
    /// * `direction` - Cone axis; normalised on store
    /// * `inner` - Half-angle of the fully lit core
    /// * `outer` - Half-angle where illumination reaches zero
    pub fn new(
        colors: PhongColors,
        position: Vector3<f32>,
        direction: Vector3<f32>,
        inner: Deg<f32>,
        outer: Deg<f32>,
    ) -> Self {
        let mut light = Self {
            colors,
            position: position.extend(1.0),
            spot_dir: Vector4::zero(),
            inner_cosine: 1.0,
            outer_cosine: 1.0,
        };
        light.set_spot_dir(direction);
        light.set_cone(inner, outer);
        light
    }

    pub fn position(&self) -> Vector4<f32> {
        self.position
    }

    pub fn spot_dir(&self) -> Vector4<f32> {
        self.spot_dir
    }

    pub fn inner_cosine(&self) -> f32 {
        self.inner_cosine
    }

    pub fn outer_cosine(&self) -> f32 {
        self.outer_cosine
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position.extend(1.0);
    }

    pub fn set_spot_dir(&mut self, direction: Vector3<f32>) {
        self.spot_dir = unit(direction).extend(0.0);
    }

    pub fn set_cone(&mut self, inner: Deg<f32>, outer: Deg<f32>) {
        use cgmath::Angle;
        self.inner_cosine = inner.cos();
        self.outer_cosine = outer.cos();
    }

    /// Cone falloff for a fragment whose light vector makes cosine `theta`
    /// with the spot axis, matching the spot-light fragment shader.
    pub fn intensity(&self, theta: f32) -> f32 {
        cone_intensity(theta, self.inner_cosine, self.outer_cosine)
    }
}

/// Smooth cone edge: 1 inside the inner cosine, 0 outside the outer one,
/// linear in between.
pub fn cone_intensity(theta: f32, inner_cosine: f32, outer_cosine: f32) -> f32 {
    let epsilon = (inner_cosine - outer_cosine).max(1e-6);
    ((theta - outer_cosine) / epsilon).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// A light source of fixed kind
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    source: LightSource,
}

#[derive(Debug, Clone, PartialEq)]
enum LightSource {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self.source {
            LightSource::Directional(_) => LightKind::Directional,
            LightSource::Point(_) => LightKind::Point,
            LightSource::Spot(_) => LightKind::Spot,
        }
    }

    pub fn colors(&self) -> &PhongColors {
        match &self.source {
            LightSource::Directional(light) => &light.colors,
            LightSource::Point(light) => &light.colors,
            LightSource::Spot(light) => &light.colors,
        }
    }

    pub fn as_directional(&self) -> Option<&DirectionalLight> {
        match &self.source {
            LightSource::Directional(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<&PointLight> {
        match &self.source {
            LightSource::Point(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_spot(&self) -> Option<&SpotLight> {
        match &self.source {
            LightSource::Spot(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_point_mut(&mut self) -> Option<&mut PointLight> {
        match &mut self.source {
            LightSource::Point(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_spot_mut(&mut self) -> Option<&mut SpotLight> {
        match &mut self.source {
            LightSource::Spot(light) => Some(light),
            _ => None,
        }
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Self {
            source: LightSource::Directional(light),
        }
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Self {
            source: LightSource::Point(light),
        }
    }
}

impl From<SpotLight> for Light {
    fn from(light: SpotLight) -> Self {
        Self {
            source: LightSource::Spot(light),
        }
    }
}

fn unit(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > f32::EPSILON {
        v.normalize()
    } else {
        Vector3::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_fixed_by_constructor() {
        let mut light: Light = PointLight::new(
            PhongColors::default(),
            Vector3::new(0.0, 2.0, 0.0),
            Attenuation::new(10.0, 0.001),
        )
        .into();

        assert_eq!(light.kind(), LightKind::Point);
        assert!(light.as_spot_mut().is_none());

        if let Some(point) = light.as_point_mut() {
            point.set_position(Vector3::new(1.0, 2.0, 3.0));
        }
        assert_eq!(light.kind(), LightKind::Point);
        assert_eq!(
            light.as_point().map(|p| p.position),
            Some(Vector4::new(1.0, 2.0, 3.0, 1.0))
        );
    }

    #[test]
    fn test_directional_cast_dir_is_normalised() {
        let light = DirectionalLight::new(PhongColors::default(), Vector3::new(0.0, -1.0, -1.0));
        assert!((light.cast_dir().truncate().magnitude() - 1.0).abs() < 1e-6);
        assert_eq!(light.cast_dir().w, 0.0);
    }

    #[test]
    fn test_attenuation_reaches_zero_far_away() {
        let attenuation = Attenuation::new(10.0, 0.001);
        assert!((attenuation.factor(0.0) - 1.0).abs() < 1e-6);
        assert!(attenuation.factor(5.0) < attenuation.factor(1.0));
        assert_eq!(attenuation.factor(10_000.0), 0.0);
    }

    #[test]
    fn test_spot_cone_converts_angles_to_cosines() {
        let spot = SpotLight::new(
            PhongColors::default(),
            Vector3::zero(),
            Vector3::new(0.0, 0.0, 2.0),
            Deg(10.0),
            Deg(14.0),
        );
        assert!((spot.inner_cosine() - 10f32.to_radians().cos()).abs() < 1e-6);
        assert!((spot.outer_cosine() - 14f32.to_radians().cos()).abs() < 1e-6);
        assert_eq!(spot.spot_dir(), Vector4::new(0.0, 0.0, 1.0, 0.0));

        assert_eq!(spot.intensity(1.0), 1.0);
        assert_eq!(spot.intensity(0.0), 0.0);
        let edge = 12f32.to_radians().cos();
        let mid = spot.intensity(edge);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_cone_with_equal_angles_has_a_hard_edge() {
        assert_eq!(cone_intensity(0.95, 0.9, 0.9), 1.0);
        assert_eq!(cone_intensity(0.85, 0.9, 0.9), 0.0);
    }
}
