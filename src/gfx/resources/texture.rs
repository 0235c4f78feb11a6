//! # Textures
//!
//! CPU-side texture objects and the bookkeeping around them:
//!
//! - [`TextureUnitAllocator`] hands out hardware texture units monotonically
//!   and fails once the pool is exhausted. Units are never reclaimed.
//! - [`ImageLoader`] decodes files into [`DecodedImage`]s; [`FileImageLoader`]
//!   is the `image`-crate implementation.
//! - [`TextureCache`] owns [`Texture`]s keyed by file name and hands out
//!   [`TextureRef`] handles, so loading the same file twice yields one texture.
//!
//! Decoded pixels stay on the CPU until [`Texture::upload`] hands them to a
//! [`RenderDevice`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AssetError, TextureError};
use crate::gfx::rendering::device::RenderDevice;

/// Index of a hardware texture unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(u32);

impl TextureUnit {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Monotonic pool of texture units
#[derive(Debug, Clone)]
pub struct TextureUnitAllocator {
    next: u32,
    limit: u32,
}

impl TextureUnitAllocator {
    pub fn new(limit: u32) -> Self {
        Self { next: 0, limit }
    }

    /// Takes the next free unit.
    ///
    /// # Errors
    /// [`TextureError::UnitsExhausted`] once `limit` units have been handed out.
    pub fn allocate(&mut self) -> Result<TextureUnit, TextureError> {
        if self.next >= self.limit {
            return Err(TextureError::UnitsExhausted { limit: self.limit });
        }
        let unit = TextureUnit(self.next);
        self.next += 1;
        Ok(unit)
    }

    pub fn allocated(&self) -> u32 {
        self.next
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.next
    }
}

/// Role of a texture within a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    Repeat,
    #[default]
    ClampToEdge,
}

/// Sampling parameters for one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerOptions {
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

impl SamplerOptions {
    /// Builder pattern: Set the filter mode
    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Builder pattern: Set the wrap mode for both axes
    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }
}

/// Storage format chosen from an image's channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Tightly packed 8-bit pixels, first row at the bottom of the image
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    /// Single-colour image of the given size.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self::new(width, height, PixelFormat::Rgba, pixels)
    }

    /// Copies a single-channel image into all three colour channels.
    pub fn replicate_red(&self) -> Self {
        if self.format != PixelFormat::Red {
            return self.clone();
        }
        let pixels = self.pixels.iter().flat_map(|&v| [v, v, v]).collect();
        Self::new(self.width, self.height, PixelFormat::Rgb, pixels)
    }

    /// RGBA8 expansion of the pixel data. Single-channel images keep their
    /// value in red only.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba => self.pixels.clone(),
            PixelFormat::Rgb => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            PixelFormat::Red => self.pixels.iter().flat_map(|&v| [v, 0, 0, 255]).collect(),
        }
    }

    /// Texel at `(x, y)` as normalised RGBA, as a shader would read it.
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let channels = self.format.channels() as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        let Some(p) = self.pixels.get(start..start + channels) else {
            return [0.0, 0.0, 0.0, 1.0];
        };
        let n = |v: u8| v as f32 / 255.0;
        match self.format {
            PixelFormat::Red => [n(p[0]), 0.0, 0.0, 1.0],
            PixelFormat::Rgb => [n(p[0]), n(p[1]), n(p[2]), 1.0],
            PixelFormat::Rgba => [n(p[0]), n(p[1]), n(p[2]), n(p[3])],
        }
    }
}

/// Decodes image files
pub trait ImageLoader {
    fn load(&mut self, path: &Path) -> Result<DecodedImage, AssetError>;
}

/// [`ImageLoader`] backed by the `image` crate
#[derive(Debug, Clone)]
pub struct FileImageLoader {
    /// Flip rows so that the first row is the bottom of the picture
    pub flip_vertically: bool,
}

impl Default for FileImageLoader {
    fn default() -> Self {
        Self {
            flip_vertically: true,
        }
    }
}

impl ImageLoader for FileImageLoader {
    fn load(&mut self, path: &Path) -> Result<DecodedImage, AssetError> {
        let mut image = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        if self.flip_vertically {
            image = image.flipv();
        }

        let (width, height) = (image.width(), image.height());
        let decoded = match image.color().channel_count() {
            1 => DecodedImage::new(width, height, PixelFormat::Red, image.into_luma8().into_raw()),
            3 => DecodedImage::new(width, height, PixelFormat::Rgb, image.into_rgb8().into_raw()),
            4 => DecodedImage::new(width, height, PixelFormat::Rgba, image.into_rgba8().into_raw()),
            channels => {
                return Err(AssetError::UnsupportedChannels {
                    path: path.to_path_buf(),
                    channels,
                })
            }
        };

        log::debug!(
            "Decoded {} ({}x{}, {:?})",
            path.display(),
            width,
            height,
            decoded.format
        );
        Ok(decoded)
    }
}

/// Non-owning handle to a [`Texture`]
///
/// A unit is never handed out twice, so it identifies the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    unit: TextureUnit,
}

impl TextureRef {
    pub fn unit(self) -> TextureUnit {
        self.unit
    }
}

/// A decoded image bound to a texture unit
#[derive(Debug, Clone)]
pub struct Texture {
    file_name: String,
    path: PathBuf,
    kind: TextureKind,
    unit: TextureUnit,
    image: DecodedImage,
    sampler: SamplerOptions,
}

impl Texture {
    /// Wraps an already decoded image, taking a unit from `units`.
    ///
    /// Single-channel specular maps are replicated to RGB.
    pub fn from_image(
        file_name: impl Into<String>,
        kind: TextureKind,
        image: DecodedImage,
        sampler: SamplerOptions,
        units: &mut TextureUnitAllocator,
    ) -> Result<Self, TextureError> {
        let image = if kind == TextureKind::Specular {
            image.replicate_red()
        } else {
            image
        };
        let file_name = file_name.into();
        Ok(Self {
            path: PathBuf::from(&file_name),
            file_name,
            kind,
            unit: units.allocate()?,
            image,
            sampler,
        })
    }

    /// Decodes `path` and allocates a unit for it.
    ///
    /// A decode failure is logged and yields `Ok(None)`; no unit is consumed.
    /// Unit exhaustion is returned as an error.
    pub fn load(
        path: &Path,
        kind: TextureKind,
        sampler: SamplerOptions,
        loader: &mut dyn ImageLoader,
        units: &mut TextureUnitAllocator,
    ) -> Result<Option<Self>, TextureError> {
        let image = match loader.load(path) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("Texture not loaded: {}", err);
                return Ok(None);
            }
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut texture = Self::from_image(file_name, kind, image, sampler, units)?;
        texture.path = path.to_path_buf();
        log::info!(
            "Loaded {:?} texture {} on unit {}",
            kind,
            path.display(),
            texture.unit.index()
        );
        Ok(Some(texture))
    }

    pub fn handle(&self) -> TextureRef {
        TextureRef { unit: self.unit }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn unit(&self) -> TextureUnit {
        self.unit
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }

    pub fn sampler(&self) -> SamplerOptions {
        self.sampler
    }

    pub fn upload(&self, device: &mut dyn RenderDevice) {
        device.upload_texture(self.unit, &self.image, self.sampler);
    }
}

/// Owning store of textures, deduplicated by key
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: Vec<Texture>,
    by_key: HashMap<String, usize>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached texture for `key`, loading it from `path` on first use.
    ///
    /// Failed loads are not cached; a later call retries the file.
    pub fn get_or_load(
        &mut self,
        key: &str,
        path: &Path,
        kind: TextureKind,
        sampler: SamplerOptions,
        loader: &mut dyn ImageLoader,
        units: &mut TextureUnitAllocator,
    ) -> Result<Option<TextureRef>, TextureError> {
        if let Some(&index) = self.by_key.get(key) {
            return Ok(Some(self.textures[index].handle()));
        }

        Ok(Texture::load(path, kind, sampler, loader, units)?
            .map(|texture| self.insert(key, texture)))
    }

    /// Stores `texture` under `key`, replacing nothing if the key is taken.
    pub fn insert(&mut self, key: &str, texture: Texture) -> TextureRef {
        if let Some(&index) = self.by_key.get(key) {
            return self.textures[index].handle();
        }
        let handle = texture.handle();
        self.by_key.insert(key.to_owned(), self.textures.len());
        self.textures.push(texture);
        handle
    }

    pub fn get(&self, handle: TextureRef) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.unit == handle.unit)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Texture> {
        self.textures.iter()
    }

    pub fn upload_all(&self, device: &mut dyn RenderDevice) {
        for texture in &self.textures {
            texture.upload(device);
        }
    }
}
