//! CPU evaluation of the forward fragment programs
//!
//! Each function reads the same uniform names as its WGSL counterpart and
//! follows the same arithmetic, so a headless frame matches what the GPU
//! would draw up to sampling and rounding differences.

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector2, Vector3, Vector4, Zero};

use super::raster::{normalize_or_zero, Fragment};
use crate::gfx::lighting::{cone_intensity, Attenuation};
use crate::gfx::resources::{DecodedImage, SamplerOptions, TextureUnit, TextureWrap};
use crate::gfx::shader::{UniformLayout, UniformView};

/// Fragment program evaluated for a headless draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shading {
    Ambient,
    Directional,
    Point,
    Spot,
}

/// Textures visible to one draw
pub(super) struct BoundTextures<'a> {
    pub uploaded: &'a HashMap<TextureUnit, (DecodedImage, SamplerOptions)>,
    pub bindings: &'a [Option<TextureUnit>],
    pub layout: &'a UniformLayout,
}

impl BoundTextures<'_> {
    /// Nearest-neighbour sample. Unbound or never-uploaded slots read white,
    /// like the fallback texture on the GPU.
    fn sample(&self, name: &str, uv: Vector2<f32>) -> Vector4<f32> {
        let texture = self
            .layout
            .texture_index(name)
            .and_then(|index| self.bindings.get(index).copied().flatten())
            .and_then(|unit| self.uploaded.get(&unit));
        let Some((image, options)) = texture else {
            return Vector4::new(1.0, 1.0, 1.0, 1.0);
        };

        let wrap = |t: f32| match options.wrap {
            TextureWrap::Repeat => t - t.floor(),
            TextureWrap::ClampToEdge => t.clamp(0.0, 1.0),
        };
        let x = ((wrap(uv.x) * image.width as f32) as u32).min(image.width.saturating_sub(1));
        let y = ((wrap(uv.y) * image.height as f32) as u32).min(image.height.saturating_sub(1));
        Vector4::from(image.texel(x, y))
    }
}

pub(super) fn shade(
    shading: Shading,
    u: &UniformView<'_>,
    textures: &BoundTextures<'_>,
    fragment: &Fragment,
) -> [f32; 4] {
    let color = match shading {
        Shading::Ambient => ambient(u, textures, fragment),
        Shading::Directional => directional(u, textures, fragment),
        Shading::Point => point(u, textures, fragment),
        Shading::Spot => spot(u, textures, fragment),
    };
    [color.x, color.y, color.z, 1.0]
}

fn vec4(u: &UniformView<'_>, name: &str) -> Vector4<f32> {
    u.vec4(name).unwrap_or_else(Vector4::zero)
}

fn flag(u: &UniformView<'_>, name: &str) -> bool {
    u.uint(name).unwrap_or(0) != 0
}

fn mul(a: Vector3<f32>, b: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(a.x * b.x, a.y * b.y, a.z * b.z)
}

fn reflect(incident: Vector3<f32>, normal: Vector3<f32>) -> Vector3<f32> {
    incident - normal * (2.0 * normal.dot(incident))
}

fn ambient(u: &UniformView<'_>, textures: &BoundTextures<'_>, fragment: &Fragment) -> Vector3<f32> {
    let albedo = if flag(u, "useDiffuseMap") {
        textures.sample("diffuseMap", fragment.uv).truncate()
    } else {
        Vector3::new(1.0, 1.0, 1.0)
    };
    mul(vec4(u, "ambient").truncate(), albedo)
}

fn surface_normal(u: &UniformView<'_>, textures: &BoundTextures<'_>, fragment: &Fragment) -> Vector3<f32> {
    let n = normalize_or_zero(fragment.normal);
    if !flag(u, "material.useNormalMap") {
        return n;
    }
    let mapped = textures.sample("material.normalMap", fragment.uv).truncate() * 2.0
        - Vector3::new(1.0, 1.0, 1.0);
    let tangent = fragment.tangent.truncate();
    let t = normalize_or_zero(tangent - n * n.dot(tangent));
    let b = n.cross(t) * fragment.tangent.w;
    normalize_or_zero(t * mapped.x + b * mapped.y + n * mapped.z)
}

fn phong(
    u: &UniformView<'_>,
    textures: &BoundTextures<'_>,
    light: &str,
    light_dir: Vector3<f32>,
    normal: Vector3<f32>,
    view_dir: Vector3<f32>,
    uv: Vector2<f32>,
) -> Vector3<f32> {
    let white = Vector3::new(1.0, 1.0, 1.0);
    let diffuse_tex = if flag(u, "material.useDiffuseMap") {
        textures.sample("material.diffuseMap", uv).truncate()
    } else {
        white
    };
    let specular_tex = if flag(u, "material.useSpecularMap") {
        textures.sample("material.specularMap", uv).truncate()
    } else {
        white
    };

    let diff = normal.dot(light_dir).max(0.0);
    let reflect_dir = reflect(-light_dir, normal);
    let shininess = u.float("material.shininessCoefficient").unwrap_or(0.0);
    let spec = view_dir.dot(reflect_dir).max(0.0).powf(shininess);

    let base = |member: &str| vec4(u, &format!("{}.base.{}", light, member)).truncate();
    let ambient = mul(mul(base("ambient"), vec4(u, "material.ambientColor").truncate()), diffuse_tex);
    let diffuse = mul(mul(base("diffuse") * diff, vec4(u, "material.diffuseColor").truncate()), diffuse_tex);
    let specular = mul(mul(base("specular") * spec, vec4(u, "material.specular").truncate()), specular_tex);
    ambient + diffuse + specular
}

fn view_dir(u: &UniformView<'_>, fragment: &Fragment) -> Vector3<f32> {
    normalize_or_zero(vec4(u, "viewPos").truncate() - fragment.world)
}

fn directional(u: &UniformView<'_>, textures: &BoundTextures<'_>, fragment: &Fragment) -> Vector3<f32> {
    let normal = surface_normal(u, textures, fragment);
    let light_dir = normalize_or_zero(-vec4(u, "dirLight.castDir").truncate());
    phong(u, textures, "dirLight", light_dir, normal, view_dir(u, fragment), fragment.uv)
}

fn point(u: &UniformView<'_>, textures: &BoundTextures<'_>, fragment: &Fragment) -> Vector3<f32> {
    let normal = surface_normal(u, textures, fragment);
    let to_light = vec4(u, "pointLight.position").truncate() - fragment.world;
    let attenuation = Attenuation::new(
        u.float("pointLight.attenuation.illuminationRadius").unwrap_or(0.0),
        u.float("pointLight.attenuation.minIllumination").unwrap_or(0.0),
    )
    .factor(to_light.magnitude());
    let color = phong(
        u,
        textures,
        "pointLight",
        normalize_or_zero(to_light),
        normal,
        view_dir(u, fragment),
        fragment.uv,
    );
    color * attenuation
}

fn spot(u: &UniformView<'_>, textures: &BoundTextures<'_>, fragment: &Fragment) -> Vector3<f32> {
    let normal = surface_normal(u, textures, fragment);
    let light_dir = normalize_or_zero(vec4(u, "spotLight.position").truncate() - fragment.world);

    let theta = light_dir.dot(normalize_or_zero(-vec4(u, "spotLight.spotDir").truncate()));
    let inner = u.float("spotLight.spotInnerCosine").unwrap_or(1.0);
    let outer = u.float("spotLight.spotOuterCosine").unwrap_or(1.0);
    let intensity = cone_intensity(theta, inner, outer);

    let color = phong(u, textures, "spotLight", light_dir, normal, view_dir(u, fragment), fragment.uv);
    color * intensity
}
