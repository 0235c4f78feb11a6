//! Model import
//!
//! An importer turns a model file into an [`ImportedScene`]: a node tree whose
//! nodes index into flat mesh and material lists. Meshes arrive with
//! per-vertex normals and UV-gradient tangent frames already computed; the
//! [`Model`](super::model::Model) loader only has to resolve handedness and
//! load textures.

use std::path::Path;

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::error::AssetError;
use crate::gfx::resources::TextureKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    /// Texture file names relative to the model file, in declaration order
    pub textures: Vec<(TextureKind, String)>,
}

impl Default for ImportedMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: [1.0; 3],
            diffuse: [1.0; 3],
            specular: [1.0; 3],
            shininess: 32.0,
            textures: Vec::new(),
        }
    }
}

impl ImportedMaterial {
    /// First texture of `kind`, if any
    pub fn texture(&self, kind: TextureKind) -> Option<&str> {
        self.textures
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, file)| file.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    /// Indices into [`ImportedScene::meshes`]
    pub meshes: Vec<usize>,
    pub children: Vec<ImportedNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedScene {
    pub root: ImportedNode,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
}

pub trait ModelImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, AssetError>;
}

/// Wavefront OBJ importer backed by `tobj`
///
/// Every OBJ object becomes one mesh under a single root node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjImporter;

impl ModelImporter for ObjImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, AssetError> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| AssetError::Import {
            path: path.to_path_buf(),
            source,
        })?;

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("no materials for '{}': {}", path.display(), e);
            Vec::new()
        });

        let mut scene = ImportedScene {
            root: ImportedNode {
                name: path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                ..Default::default()
            },
            materials: materials.iter().map(convert_material).collect(),
            ..Default::default()
        };

        for model in models {
            let mesh = &model.mesh;
            let positions: Vec<[f32; 3]> = mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();
            let tex_coords: Vec<[f32; 2]> = if mesh.texcoords.len() / 2 == positions.len() {
                mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()
            } else {
                vec![[0.0; 2]; positions.len()]
            };
            let normals = if mesh.normals.len() == mesh.positions.len() {
                mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect()
            } else {
                compute_smooth_normals(&positions, &mesh.indices)
            };
            let (tangents, bitangents) = compute_tangents(&positions, &tex_coords, &mesh.indices);

            scene.root.meshes.push(scene.meshes.len());
            scene.meshes.push(ImportedMesh {
                name: model.name.clone(),
                positions,
                tex_coords,
                normals,
                tangents,
                bitangents,
                indices: mesh.indices.clone(),
                material: mesh.material_id.filter(|&id| id < scene.materials.len()),
            });
        }

        log::debug!(
            "imported '{}': {} meshes, {} materials",
            path.display(),
            scene.meshes.len(),
            scene.materials.len()
        );
        Ok(scene)
    }
}

fn convert_material(mtl: &tobj::Material) -> ImportedMaterial {
    let defaults = ImportedMaterial::default();
    let mut textures = Vec::new();
    if let Some(file) = &mtl.diffuse_texture {
        textures.push((TextureKind::Diffuse, file.clone()));
    }
    if let Some(file) = &mtl.specular_texture {
        textures.push((TextureKind::Specular, file.clone()));
    }
    // tobj reports map_Bump as the normal texture
    if let Some(file) = mtl.normal_texture.as_ref().or_else(|| mtl.unknown_param.get("norm")) {
        textures.push((TextureKind::Normal, file.clone()));
    }
    if let Some(file) = mtl.unknown_param.get("disp") {
        textures.push((TextureKind::Height, file.clone()));
    }

    ImportedMaterial {
        name: mtl.name.clone(),
        ambient: mtl.ambient.unwrap_or(defaults.ambient),
        diffuse: mtl.diffuse.unwrap_or(defaults.diffuse),
        specular: mtl.specular.unwrap_or(defaults.specular),
        shininess: mtl.shininess.unwrap_or(defaults.shininess),
        textures,
    }
}

fn triangle(indices: &[u32]) -> Option<[usize; 3]> {
    match indices {
        [a, b, c] => Some([*a as usize, *b as usize, *c as usize]),
        _ => None,
    }
}

/// Area-weighted vertex normals for meshes that ship without them.
pub fn compute_smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vector3::zero(); positions.len()];

    for [i0, i1, i2] in indices.chunks_exact(3).filter_map(triangle) {
        let (Some(p0), Some(p1), Some(p2)) = (positions.get(i0), positions.get(i1), positions.get(i2)) else {
            continue;
        };
        let (p0, p1, p2) = (Vector3::from(*p0), Vector3::from(*p1), Vector3::from(*p2));
        let face = (p1 - p0).cross(p2 - p0);
        for i in [i0, i1, i2] {
            normals[i] += face;
        }
    }

    normals
        .into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

/// Per-vertex tangents and bitangents from UV gradients
///
/// Each triangle contributes `T = (e1·dv2 - e2·dv1) / det` and
/// `B = (e2·du1 - e1·du2) / det`, summed over the triangles sharing a vertex.
/// Triangles with degenerate UVs contribute nothing.
pub fn compute_tangents(
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    indices: &[u32],
) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
    let mut tangents = vec![Vector3::zero(); positions.len()];
    let mut bitangents = vec![Vector3::zero(); positions.len()];

    for [i0, i1, i2] in indices.chunks_exact(3).filter_map(triangle) {
        let (Some(p0), Some(p1), Some(p2)) = (positions.get(i0), positions.get(i1), positions.get(i2)) else {
            continue;
        };
        let (Some(uv0), Some(uv1), Some(uv2)) = (tex_coords.get(i0), tex_coords.get(i1), tex_coords.get(i2)) else {
            continue;
        };

        let e1 = Vector3::from(*p1) - Vector3::from(*p0);
        let e2 = Vector3::from(*p2) - Vector3::from(*p0);
        let d1 = Vector2::from(*uv1) - Vector2::from(*uv0);
        let d2 = Vector2::from(*uv2) - Vector2::from(*uv0);

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let bitangent = (e2 * d1.x - e1 * d2.x) * r;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    (
        tangents.into_iter().map(Into::into).collect(),
        bitangents.into_iter().map(Into::into).collect(),
    )
}

/// Orthonormalises `tangent` against `normal` and packs the handedness in `w`.
///
/// `w` is `-1` when `(T, B, N)` is left-handed, which happens where the UVs
/// are mirrored relative to the triangle winding, and `+1` otherwise,
/// including when the triple is degenerate.
pub fn tangent_with_handedness(normal: [f32; 3], tangent: [f32; 3], bitangent: [f32; 3]) -> [f32; 4] {
    let n = Vector3::from(normal);
    let t = Vector3::from(tangent);
    let b = Vector3::from(bitangent);

    let projected = t - n * n.dot(t);
    let t = if projected.magnitude2() > f32::EPSILON {
        projected.normalize()
    } else if t.magnitude2() > f32::EPSILON {
        t.normalize()
    } else {
        // No UV gradient: any unit vector orthogonal to the normal
        let axis = if n.x.abs() < 0.9 { Vector3::unit_x() } else { Vector3::unit_y() };
        let fallback = axis - n * n.dot(axis);
        if fallback.magnitude2() > f32::EPSILON {
            fallback.normalize()
        } else {
            Vector3::unit_x()
        }
    };

    let w = if t.cross(b).dot(n) < 0.0 { -1.0 } else { 1.0 };
    [t.x, t.y, t.z, w]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    #[test]
    fn test_tangents_follow_uv_gradient() {
        let uvs = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let (tangents, bitangents) = compute_tangents(&TRIANGLE, &uvs, &[0, 1, 2]);
        assert_eq!(tangents[0], [1.0, 0.0, 0.0]);
        assert_eq!(bitangents[0], [0.0, 1.0, 0.0]);

        let packed = tangent_with_handedness([0.0, 0.0, 1.0], tangents[0], bitangents[0]);
        assert_eq!(packed, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_mirrored_uvs_flip_handedness() {
        let uvs = [[1.0, 0.0], [0.0, 0.0], [1.0, 1.0]];
        let (tangents, bitangents) = compute_tangents(&TRIANGLE, &uvs, &[0, 1, 2]);
        let packed = tangent_with_handedness([0.0, 0.0, 1.0], tangents[1], bitangents[1]);
        assert_eq!(packed[3], -1.0);
        assert!((packed[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_frame_keeps_positive_sign() {
        let packed = tangent_with_handedness([0.0, 1.0, 0.0], [0.0; 3], [0.0; 3]);
        assert_eq!(packed[3], 1.0);
        let t = Vector3::new(packed[0], packed[1], packed[2]);
        assert!((t.magnitude() - 1.0).abs() < 1e-6);
        assert!(t.dot(Vector3::unit_y()).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_normals_of_ccw_triangle_face_positive_z() {
        let normals = compute_smooth_normals(&TRIANGLE, &[0, 1, 2]);
        for normal in normals {
            assert_eq!(normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_obj_import_with_material() {
        let dir = tempfile::tempdir().unwrap();
        let mut mtl = std::fs::File::create(dir.path().join("quad.mtl")).unwrap();
        writeln!(mtl, "newmtl painted\nKa 0.1 0.1 0.1\nKd 0.5 0.25 1.0\nKs 0.2 0.2 0.2\nNs 64\nmap_Kd paint.png\nmap_Ks paint_spec.png").unwrap();

        let obj_path = dir.path().join("quad.obj");
        let mut obj = std::fs::File::create(&obj_path).unwrap();
        writeln!(
            obj,
            "mtllib quad.mtl\no quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nusemtl painted\nf 1/1 2/2 3/3 4/4"
        )
        .unwrap();

        let scene = ObjImporter.import(&obj_path).unwrap();
        assert_eq!(scene.root.meshes, vec![0]);
        assert_eq!(scene.meshes.len(), 1);

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
        assert_eq!(mesh.tangents.len(), 4);

        let material = &scene.materials[mesh.material.unwrap()];
        assert_eq!(material.diffuse, [0.5, 0.25, 1.0]);
        assert_eq!(material.shininess, 64.0);
        assert_eq!(material.texture(TextureKind::Diffuse), Some("paint.png"));
        assert_eq!(material.texture(TextureKind::Specular), Some("paint_spec.png"));
        assert_eq!(material.texture(TextureKind::Normal), None);
    }

    #[test]
    fn test_missing_obj_is_an_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ObjImporter.import(&dir.path().join("absent.obj"));
        assert!(matches!(result, Err(AssetError::Import { .. })));
    }
}
