//! Phong materials
//!
//! A [`Material`] is a plain value: colours, a shininess exponent and up to
//! three optional texture handles. The textures themselves live in a
//! [`TextureCache`](super::texture::TextureCache) owned by a model or scene.

use cgmath::Vector4;

use super::texture::TextureRef;

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient_color: Vector4<f32>,
    pub diffuse_color: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub shininess: f32,

    pub diffuse_map: Option<TextureRef>,
    pub specular_map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,

    pub disable_diffuse_map: bool,
    pub disable_specular_map: bool,
    pub disable_normal_map: bool,
}

impl Default for Material {
    fn default() -> Self {
        let white = Vector4::new(1.0, 1.0, 1.0, 1.0);
        Self {
            name: String::from("default"),
            ambient_color: white,
            diffuse_color: white,
            specular: white,
            shininess: 32.0,
            diffuse_map: None,
            specular_map: None,
            normal_map: None,
            disable_diffuse_map: false,
            disable_specular_map: false,
            disable_normal_map: false,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder pattern: Set the ambient colour
    pub fn with_ambient(mut self, color: Vector4<f32>) -> Self {
        self.ambient_color = color;
        self
    }

    /// Builder pattern: Set the diffuse colour
    pub fn with_diffuse(mut self, color: Vector4<f32>) -> Self {
        self.diffuse_color = color;
        self
    }

    /// Builder pattern: Set the specular colour
    pub fn with_specular(mut self, color: Vector4<f32>) -> Self {
        self.specular = color;
        self
    }

    /// Builder pattern: Set the specular exponent
    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    /// Builder pattern: Set the diffuse map
    pub fn with_diffuse_map(mut self, texture: Option<TextureRef>) -> Self {
        self.diffuse_map = texture;
        self
    }

    /// Builder pattern: Set the specular map
    pub fn with_specular_map(mut self, texture: Option<TextureRef>) -> Self {
        self.specular_map = texture;
        self
    }

    /// Builder pattern: Set the normal map
    pub fn with_normal_map(mut self, texture: Option<TextureRef>) -> Self {
        self.normal_map = texture;
        self
    }

    /// Diffuse map to sample, unless absent or switched off
    pub fn active_diffuse_map(&self) -> Option<TextureRef> {
        self.diffuse_map.filter(|_| !self.disable_diffuse_map)
    }

    pub fn active_specular_map(&self) -> Option<TextureRef> {
        self.specular_map.filter(|_| !self.disable_specular_map)
    }

    pub fn active_normal_map(&self) -> Option<TextureRef> {
        self.normal_map.filter(|_| !self.disable_normal_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::texture::{
        DecodedImage, SamplerOptions, Texture, TextureKind, TextureUnitAllocator,
    };

    #[test]
    fn test_defaults() {
        let material = Material::default();
        assert_eq!(material.shininess, 32.0);
        assert_eq!(material.diffuse_color, Vector4::new(1.0, 1.0, 1.0, 1.0));
        assert!(material.active_diffuse_map().is_none());
    }

    #[test]
    fn test_disabled_map_is_not_active() {
        let mut units = TextureUnitAllocator::new(4);
        let texture = Texture::from_image(
            "crate.png",
            TextureKind::Diffuse,
            DecodedImage::solid(1, 1, [255; 4]),
            SamplerOptions::default(),
            &mut units,
        )
        .unwrap();

        let mut material = Material::new("crate").with_diffuse_map(Some(texture.handle()));
        assert_eq!(material.active_diffuse_map(), Some(texture.handle()));

        material.disable_diffuse_map = true;
        assert_eq!(material.active_diffuse_map(), None);
        assert_eq!(material.diffuse_map, Some(texture.handle()));
    }
}
