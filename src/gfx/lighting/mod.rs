//! Phong light sources
//!
//! A [`Light`] is one of three kinds, fixed at construction. The forward
//! renderer dispatches on [`LightKind`] to pick the matching shader program.

pub mod light;

pub use light::{
    cone_intensity, Attenuation, DirectionalLight, Light, LightKind, PhongColors, PointLight,
    SpotLight,
};
