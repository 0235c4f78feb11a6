//! # Models
//!
//! A [`Model`] is a set of meshes under one root transform, built from an
//! imported node tree. Textures referenced by the model's materials are
//! loaded once per file name into the model's own [`TextureCache`]; materials
//! hold only [`TextureRef`](crate::gfx::resources::TextureRef) handles into it.

use std::path::{Path, PathBuf};

use cgmath::Vector3;

use super::import::{tangent_with_handedness, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, ModelImporter};
use super::mesh::Mesh;
use super::vertex::Vertex3D;
use crate::error::TextureError;
use crate::gfx::rendering::forward::{Drawable, ForwardPrograms, FrameContext};
use crate::gfx::rendering::RenderDevice;
use crate::gfx::resources::{
    ImageLoader, Material, SamplerOptions, TextureCache, TextureKind, TextureRef, TextureUnitAllocator,
};
use crate::gfx::transform::{Transform, TransformId, Transforms};

/// Shared state for building models
pub struct ModelLoader<'a> {
    pub transforms: &'a mut Transforms,
    pub images: &'a mut dyn ImageLoader,
    pub units: &'a mut TextureUnitAllocator,
}

#[derive(Debug)]
pub struct Model {
    name: String,
    directory: PathBuf,
    root: TransformId,
    meshes: Vec<Mesh>,
    textures: TextureCache,
}

impl Model {
    /// Imports `path` and builds its meshes
    ///
    /// A failed import is logged and yields a model with no meshes. Missing
    /// textures leave the corresponding material slot empty.
    ///
    /// # Errors
    /// [`TextureError::UnitsExhausted`] when the texture-unit pool runs out
    pub fn load(
        path: &Path,
        importer: &dyn ModelImporter,
        loader: &mut ModelLoader<'_>,
    ) -> Result<Model, TextureError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match importer.import(path) {
            Ok(scene) => Self::from_scene(name, &directory, &scene, loader),
            Err(e) => {
                log::error!("{}", e);
                Ok(Self::empty(name, directory, loader.transforms))
            }
        }
    }

    fn empty(name: String, directory: PathBuf, transforms: &mut Transforms) -> Self {
        Self {
            name,
            directory,
            root: transforms.insert(Transform::default()),
            meshes: Vec::new(),
            textures: TextureCache::new(),
        }
    }

    /// Builds a model from an imported scene, resolving textures against `directory`.
    pub fn from_scene(
        name: impl Into<String>,
        directory: &Path,
        scene: &ImportedScene,
        loader: &mut ModelLoader<'_>,
    ) -> Result<Model, TextureError> {
        let mut model = Self::empty(name.into(), directory.to_path_buf(), loader.transforms);
        model.read_node(&scene.root, scene, loader)?;
        log::info!(
            "model '{}': {} meshes, {} textures",
            model.name,
            model.meshes.len(),
            model.textures.len()
        );
        Ok(model)
    }

    fn read_node(
        &mut self,
        node: &ImportedNode,
        scene: &ImportedScene,
        loader: &mut ModelLoader<'_>,
    ) -> Result<(), TextureError> {
        for &index in &node.meshes {
            let Some(mesh) = scene.meshes.get(index) else {
                log::warn!("node '{}' references missing mesh {}", node.name, index);
                continue;
            };
            let material = mesh.material.and_then(|index| scene.materials.get(index));
            let mesh = self.read_mesh(mesh, material, loader)?;
            self.meshes.push(mesh);
        }

        for child in &node.children {
            self.read_node(child, scene, loader)?;
        }
        Ok(())
    }

    fn read_mesh(
        &mut self,
        mesh: &ImportedMesh,
        material: Option<&ImportedMaterial>,
        loader: &mut ModelLoader<'_>,
    ) -> Result<Mesh, TextureError> {
        let vertices = (0..mesh.positions.len())
            .map(|i| {
                let normal = mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
                let tangent = mesh.tangents.get(i).copied().unwrap_or([0.0; 3]);
                let bitangent = mesh.bitangents.get(i).copied().unwrap_or([0.0; 3]);
                Vertex3D {
                    position: mesh.positions[i],
                    tex_coord: mesh.tex_coords.get(i).copied().unwrap_or([0.0; 2]),
                    normal,
                    tangent: tangent_with_handedness(normal, tangent, bitangent),
                }
            })
            .collect();

        let material = match material {
            Some(imported) => self.read_material(imported, loader)?,
            None => Material::new(mesh.name.clone()),
        };

        let transform = loader.transforms.insert(Transform::default().with_parent(self.root));
        Ok(Mesh::new(mesh.name.clone(), vertices, mesh.indices.clone(), material, transform))
    }

    fn read_material(
        &mut self,
        imported: &ImportedMaterial,
        loader: &mut ModelLoader<'_>,
    ) -> Result<Material, TextureError> {
        let color = |c: [f32; 3]| Vector3::from(c).extend(1.0);
        Ok(Material::new(imported.name.clone())
            .with_ambient(color(imported.ambient))
            .with_diffuse(color(imported.diffuse))
            .with_specular(color(imported.specular))
            .with_shininess(imported.shininess)
            .with_diffuse_map(self.read_texture(imported, TextureKind::Diffuse, loader)?)
            .with_specular_map(self.read_texture(imported, TextureKind::Specular, loader)?)
            .with_normal_map(self.read_texture(imported, TextureKind::Normal, loader)?))
    }

    /// First texture of `kind`, deduplicated by file name
    fn read_texture(
        &mut self,
        imported: &ImportedMaterial,
        kind: TextureKind,
        loader: &mut ModelLoader<'_>,
    ) -> Result<Option<TextureRef>, TextureError> {
        let Some(file_name) = imported.texture(kind) else {
            return Ok(None);
        };
        let path = self.directory.join(file_name);
        self.textures.get_or_load(
            file_name,
            &path,
            kind,
            SamplerOptions::default(),
            &mut *loader.images,
            &mut *loader.units,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root transform every mesh is parented to
    pub fn root(&self) -> TransformId {
        self.root
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn set_position(&self, transforms: &mut Transforms, position: Vector3<f32>) {
        if let Some(mut root) = transforms.get_mut(self.root) {
            root.set_position(position);
        }
    }

    pub fn set_scale(&self, transforms: &mut Transforms, scale: Vector3<f32>) {
        if let Some(mut root) = transforms.get_mut(self.root) {
            root.set_scale(scale);
        }
    }

    /// Rotates the whole model; meshes follow through their parent link.
    pub fn set_rotation(&self, transforms: &mut Transforms, rotation: Vector3<f32>) {
        if let Some(mut root) = transforms.get_mut(self.root) {
            root.set_rotation(rotation);
        }
    }

    /// Removes the root and every mesh transform from the arena.
    pub fn release(self, transforms: &mut Transforms) {
        for mesh in &self.meshes {
            transforms.remove(mesh.transform());
        }
        transforms.remove(self.root);
    }

    /// Uploads textures and mesh buffers.
    pub fn upload(&mut self, device: &mut dyn RenderDevice) {
        self.textures.upload_all(device);
        for mesh in &mut self.meshes {
            mesh.upload(device);
        }
    }
}

impl Drawable for Model {
    fn draw(&self, device: &mut dyn RenderDevice, frame: &FrameContext<'_>, programs: &mut ForwardPrograms<'_>) {
        for mesh in &self.meshes {
            mesh.draw(device, frame, programs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::gfx::resources::texture::tests::CountingLoader;
    use cgmath::{Matrix4, Rad, SquareMatrix};

    fn quad_mesh(name: &str, material: usize, mirrored: bool) -> ImportedMesh {
        let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let tex_coords = if mirrored {
            vec![[1.0, 0.0], [0.0, 0.0], [1.0, 1.0]]
        } else {
            vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
        };
        let indices = vec![0, 1, 2];
        let (tangents, bitangents) = super::super::import::compute_tangents(&positions, &tex_coords, &indices);
        ImportedMesh {
            name: name.to_owned(),
            normals: vec![[0.0, 0.0, 1.0]; 3],
            positions,
            tex_coords,
            tangents,
            bitangents,
            indices,
            material: Some(material),
        }
    }

    fn shared_texture_scene() -> ImportedScene {
        let material = |name: &str| ImportedMaterial {
            name: name.to_owned(),
            textures: vec![(TextureKind::Diffuse, "shared.png".to_owned())],
            ..Default::default()
        };
        ImportedScene {
            root: ImportedNode {
                name: "root".to_owned(),
                meshes: vec![0],
                children: vec![ImportedNode {
                    name: "child".to_owned(),
                    meshes: vec![1],
                    children: Vec::new(),
                }],
            },
            meshes: vec![quad_mesh("a", 0, false), quad_mesh("b", 1, true)],
            materials: vec![material("first"), material("second")],
        }
    }

    #[test]
    fn test_same_file_is_decoded_once_and_shared() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(32);
        let mut loader = ModelLoader {
            transforms: &mut transforms,
            images: &mut images,
            units: &mut units,
        };

        let model = Model::from_scene("shared", Path::new("models"), &shared_texture_scene(), &mut loader).unwrap();

        assert_eq!(images.calls, 1);
        assert_eq!(units.allocated(), 1);
        assert_eq!(model.textures().len(), 1);
        let maps: Vec<_> = model.meshes().iter().map(|mesh| mesh.material.diffuse_map).collect();
        assert_eq!(maps.len(), 2);
        assert!(maps[0].is_some());
        assert_eq!(maps[0], maps[1]);
    }

    #[test]
    fn test_mirrored_uvs_store_negative_handedness() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(32);
        let mut loader = ModelLoader {
            transforms: &mut transforms,
            images: &mut images,
            units: &mut units,
        };

        let model = Model::from_scene("mirror", Path::new("models"), &shared_texture_scene(), &mut loader).unwrap();

        assert!(model.meshes()[0].vertices().iter().all(|v| v.tangent[3] == 1.0));
        assert!(model.meshes()[1].vertices().iter().all(|v| v.tangent[3] == -1.0));
    }

    #[test]
    fn test_meshes_follow_root_transform() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(32);
        let model = {
            let mut loader = ModelLoader {
                transforms: &mut transforms,
                images: &mut images,
                units: &mut units,
            };
            Model::from_scene("rotating", Path::new("models"), &shared_texture_scene(), &mut loader).unwrap()
        };

        let mesh = model.meshes()[1].transform();
        assert_eq!(transforms.global_matrix(mesh), Matrix4::identity());

        model.set_rotation(&mut transforms, Vector3::new(0.0, 1.0, 0.0));
        let rotated = transforms.global_matrix(mesh);
        let expected = Matrix4::from_angle_y(Rad(1.0));
        for column in 0..4 {
            for row in 0..4 {
                assert!((rotated[column][row] - expected[column][row]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_release_frees_every_transform() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(32);
        let model = {
            let mut loader = ModelLoader {
                transforms: &mut transforms,
                images: &mut images,
                units: &mut units,
            };
            Model::from_scene("released", Path::new("models"), &shared_texture_scene(), &mut loader).unwrap()
        };
        let mut ids: Vec<_> = model.meshes().iter().map(|mesh| mesh.transform()).collect();
        ids.push(model.root());
        assert_eq!(transforms.len(), 3);

        model.release(&mut transforms);

        assert!(transforms.is_empty());
        assert!(ids.iter().all(|&id| !transforms.contains(id)));
    }

    #[test]
    fn test_missing_texture_leaves_slot_empty() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader {
            missing: vec![Path::new("models").join("shared.png")],
            ..Default::default()
        };
        let mut units = TextureUnitAllocator::new(32);
        let mut loader = ModelLoader {
            transforms: &mut transforms,
            images: &mut images,
            units: &mut units,
        };

        let model = Model::from_scene("bare", Path::new("models"), &shared_texture_scene(), &mut loader).unwrap();
        assert!(model.meshes().iter().all(|mesh| mesh.material.diffuse_map.is_none()));
        assert_eq!(units.allocated(), 0);
    }

    #[test]
    fn test_unit_exhaustion_is_an_error() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(0);
        let mut loader = ModelLoader {
            transforms: &mut transforms,
            images: &mut images,
            units: &mut units,
        };

        let result = Model::from_scene("full", Path::new("models"), &shared_texture_scene(), &mut loader);
        assert_eq!(result.unwrap_err(), TextureError::UnitsExhausted { limit: 0 });
    }

    struct FailingImporter;

    impl ModelImporter for FailingImporter {
        fn import(&self, path: &Path) -> Result<ImportedScene, AssetError> {
            Err(AssetError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    #[test]
    fn test_failed_import_yields_empty_model() {
        let mut transforms = Transforms::new();
        let mut images = CountingLoader::default();
        let mut units = TextureUnitAllocator::new(32);
        let mut loader = ModelLoader {
            transforms: &mut transforms,
            images: &mut images,
            units: &mut units,
        };

        let model = Model::load(Path::new("models/absent.obj"), &FailingImporter, &mut loader).unwrap();
        assert_eq!(model.name(), "absent");
        assert!(model.meshes().is_empty());
        assert!(transforms.contains(model.root()));
    }
}
