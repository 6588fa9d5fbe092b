/// Texture cache
///
/// Loads each distinct texture path once and hands out [`TextureId`] slots.
/// Every entry owns its device image and one descriptor set (image + sampler)
/// allocated from one pool. Slot 0 is the default texture and has a reserved
/// set; the remaining `max_objects` sets are for loaded textures.
///
/// There is no eviction: entries live until the cache is dropped, after the
/// device has finished every frame that samples them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroup, BindingLayout, BindingResource, DescriptorPool, DescriptorPoolDesc, GraphicsDevice,
    SamplerType, Texture,
};
use crate::resource::{upload_texture, DecodedImage, ImageDecoder};
use crate::{engine_debug, engine_info, engine_warn};

/// Slot of a texture in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// The default (white or configured) texture
    pub const DEFAULT: TextureId = TextureId(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

struct TextureEntry {
    path: Option<PathBuf>,
    texture: Arc<dyn Texture>,
    binding_group: Arc<dyn BindingGroup>,
}

/// Deduplicating texture store
pub struct TextureCache {
    device: Arc<dyn GraphicsDevice>,
    decoder: Box<dyn ImageDecoder>,
    // Entries hold sets from this pool; declared first so they drop first
    entries: Vec<TextureEntry>,
    by_path: FxHashMap<PathBuf, TextureId>,
    pool: Arc<dyn DescriptorPool>,
    max_objects: u32,
}

impl TextureCache {
    /// Create the cache and load the default texture into slot 0
    ///
    /// # Arguments
    ///
    /// * `device` - Device the textures live on
    /// * `decoder` - Image file decoder
    /// * `max_objects` - Number of textures that can be loaded besides the default
    /// * `default_texture` - Image for slot 0; a 1x1 white texel when `None`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        decoder: Box<dyn ImageDecoder>,
        max_objects: u32,
        default_texture: Option<&Path>,
    ) -> Result<Self> {
        if max_objects == 0 {
            return Err(Error::InvalidResource("texture pool capacity must be > 0".to_string()));
        }
        let max_sets = max_objects
            .checked_add(1)
            .ok_or_else(|| Error::InvalidResource(format!("texture capacity {} is too large", max_objects)))?;
        let pool = device.create_descriptor_pool(DescriptorPoolDesc {
            layout: BindingLayout::Texture,
            max_sets,
        })?;

        let mut cache = Self {
            device,
            decoder,
            entries: Vec::new(),
            by_path: FxHashMap::default(),
            pool,
            max_objects,
        };

        match default_texture {
            Some(path) => {
                let image = cache.decoder.decode(path)?;
                cache.insert(Some(path.to_path_buf()), &image)?;
            }
            None => {
                cache.insert(None, &DecodedImage::white())?;
            }
        }

        engine_info!("vista::TextureCache", "Texture cache ready ({} slots)", max_objects);
        Ok(cache)
    }

    /// Return the slot of `path`, loading it on first use
    ///
    /// Fails with `PoolExhausted` once `max_objects` textures besides the
    /// default are loaded; the slots already handed out stay valid.
    pub fn get_or_load(&mut self, path: impl AsRef<Path>) -> Result<TextureId> {
        let path = path.as_ref();
        if let Some(id) = self.by_path.get(path) {
            return Ok(*id);
        }

        if self.loaded_count() >= self.max_objects {
            engine_warn!(
                "vista::TextureCache",
                "Cannot load '{}': all {} texture slots are in use",
                path.display(),
                self.max_objects
            );
            return Err(Error::PoolExhausted { capacity: self.max_objects });
        }

        let image = self.decoder.decode(path)?;
        self.insert(Some(path.to_path_buf()), &image)
    }

    fn insert(&mut self, path: Option<PathBuf>, image: &DecodedImage) -> Result<TextureId> {
        let texture = upload_texture(self.device.as_ref(), image)?;
        let binding_group = self
            .pool
            .allocate(&[BindingResource::SampledTexture(texture.as_ref(), SamplerType::LinearRepeat)])?;

        let id = TextureId(self.entries.len() as u32);
        engine_debug!(
            "vista::TextureCache",
            "Slot {} <- {} ({}x{})",
            id.0,
            path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<white>".to_string()),
            image.width,
            image.height
        );
        if let Some(path) = &path {
            self.by_path.insert(path.clone(), id);
        }
        self.entries.push(TextureEntry { path, texture, binding_group });
        Ok(id)
    }

    fn entry(&self, id: TextureId) -> Result<&TextureEntry> {
        self.entries.get(id.index()).ok_or_else(|| {
            Error::InvalidResource(format!("texture slot {} is not loaded ({} slots)", id.0, self.entries.len()))
        })
    }

    /// Descriptor set of `id`; `InvalidResource` for an unresolved slot
    pub fn binding_group(&self, id: TextureId) -> Result<&Arc<dyn BindingGroup>> {
        Ok(&self.entry(id)?.binding_group)
    }

    pub fn texture(&self, id: TextureId) -> Result<&Arc<dyn Texture>> {
        Ok(&self.entry(id)?.texture)
    }

    /// Source path of `id` (`None` for a generated default)
    pub fn path(&self, id: TextureId) -> Option<&Path> {
        self.entries.get(id.index()).and_then(|e| e.path.as_deref())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.by_path.contains_key(path.as_ref())
    }

    /// Number of loaded textures, default included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Textures that can be loaded besides the default
    pub fn capacity(&self) -> u32 {
        self.max_objects
    }

    fn loaded_count(&self) -> u32 {
        self.entries.len().saturating_sub(1) as u32
    }
}

#[cfg(test)]
#[path = "texture_cache_tests.rs"]
mod tests;
