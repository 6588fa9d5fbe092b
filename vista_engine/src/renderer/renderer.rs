/// Frame orchestrator
///
/// Owns the frame-in-flight slots, the shader modules, the texture cache, the
/// loaded models and everything built on the presentable chain, and drives
/// the frame loop:
///
/// 1. wait on the slot's fence (the only CPU throttle: at most F frames ahead)
/// 2. acquire a chain image; a stale chain is rebuilt and the frame dropped
/// 3. write the camera uniform of that image
/// 4. record the two subpasses into the slot's command list
/// 5. submit, signaling the slot's fence and rendering-finished semaphore
/// 6. present; a stale chain is rebuilt
/// 7. advance to the next slot
///
/// Every call happens on one thread; the renderer is the single submitter.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use glam::{Mat4, Vec3};
use slotmap::{new_key_type, SlotMap};
use crate::camera::Camera;
use crate::config::RendererSettings;
use crate::error::{Error, Result};
use crate::graphics_device::{Extent2D, FrameSync, GraphicsDevice, Swapchain, TextureFormat};
use crate::renderer::shader_sources::{ShaderModules, ShaderSources};
use crate::renderer::swapchain_resources::{FrameContext, SwapchainResources};
use crate::renderer::{FrameStats, Overlay};
use crate::resource::{
    texture_file_name, ImageDecoder, ImportedModel, Mesh, MeshModel, ModelImporter, TextureCache, TextureId,
    Vertex,
};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

new_key_type! {
    /// Handle of a model owned by the renderer
    pub struct ModelKey;
}

/// Outcome of [`Renderer::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented
    Presented { image_index: u32 },
    /// The chain was stale; it was rebuilt and nothing was presented
    Rebuilt,
    /// The surface has no area (minimized window); nothing was done
    Skipped,
}

/// Constant rotation applied on top of a model's transform
#[derive(Debug, Clone, Copy)]
struct Spin {
    axis: Vec3,
    radians_per_second: f32,
    angle: f32,
}

struct ModelEntry {
    model: MeshModel,
    base_transform: Mat4,
    spin: Option<Spin>,
}

impl ModelEntry {
    fn new(model: MeshModel) -> Self {
        Self { model, base_transform: Mat4::IDENTITY, spin: None }
    }

    fn apply_transform(&mut self) {
        let rotation = self
            .spin
            .map(|spin| Mat4::from_axis_angle(spin.axis, spin.angle))
            .unwrap_or(Mat4::IDENTITY);
        self.model.set_transform(self.base_transform * rotation);
    }
}

/// The frame orchestrator
///
/// Field order is drop order: chain dependents, then models and textures,
/// then shaders and frame slots, then the chain. `Drop` waits for the device
/// to go idle first.
pub struct Renderer {
    resources: Option<SwapchainResources>,
    models: SlotMap<ModelKey, ModelEntry>,
    textures: TextureCache,
    overlay: Option<Box<dyn Overlay>>,
    shaders: ShaderModules,
    frame_syncs: Vec<Box<dyn FrameSync>>,
    swapchain: Box<dyn Swapchain>,
    /// Frame slot whose fence guards each chain image, if any
    image_owners: Vec<Option<usize>>,
    current_frame: usize,
    /// Extent the chain is rebuilt against
    target_extent: Extent2D,
    pending_resize: Option<Extent2D>,
    camera: Camera,
    settings: RendererSettings,
    stats: FrameStats,
    last_present: Option<Instant>,
    device: Arc<dyn GraphicsDevice>,
}

impl Renderer {
    /// Build the renderer on an existing device and chain
    ///
    /// Creation order: frame slots, shader modules, texture cache (default
    /// texture in slot 0), chain dependents.
    ///
    /// # Arguments
    ///
    /// * `device` - Device every GPU object is created on
    /// * `swapchain` - Chain created on the same device
    /// * `shaders` - SPIR-V of the scene and composite pipelines
    /// * `settings` - Frames in flight, texture capacity, clear color
    /// * `decoder` - Image decoder used by the texture cache
    /// * `default_texture` - Image for texture slot 0; white when `None`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        shaders: &ShaderSources,
        settings: RendererSettings,
        decoder: Box<dyn ImageDecoder>,
        default_texture: Option<&Path>,
    ) -> Result<Self> {
        settings.validate()?;

        let frame_syncs = (0..settings.frames_in_flight)
            .map(|_| device.create_frame_sync())
            .collect::<Result<Vec<_>>>()?;
        let shaders = ShaderModules::create(device.as_ref(), shaders)?;
        let textures = TextureCache::new(Arc::clone(&device), decoder, settings.max_objects, default_texture)?;

        let resources = SwapchainResources::create(
            &FrameContext { device: device.as_ref(), settings: &settings, shaders: &shaders },
            swapchain.as_ref(),
        )?;

        let extent = swapchain.extent();
        engine_info!(
            "vista::Renderer",
            "Renderer ready: {}x{} {:?}, {} images, {} frames in flight",
            extent.width,
            extent.height,
            swapchain.format(),
            swapchain.image_count(),
            settings.frames_in_flight
        );

        Ok(Self {
            image_owners: vec![None; resources.image_count()],
            resources: Some(resources),
            models: SlotMap::with_key(),
            textures,
            overlay: None,
            shaders,
            frame_syncs,
            swapchain,
            current_frame: 0,
            target_extent: extent,
            pending_resize: None,
            camera: Camera::looking_at_origin(extent.aspect_ratio()),
            settings,
            stats: FrameStats::new(),
            last_present: None,
            device,
        })
    }

    // ===== FRAME LOOP =====

    /// Render and present one frame
    ///
    /// Staleness reported by acquire or present is handled here by
    /// rebuilding the chain; only fatal errors are returned.
    pub fn draw_frame(&mut self) -> Result<FrameStatus> {
        if let Some(extent) = self.pending_resize {
            if extent.is_empty() {
                return Ok(FrameStatus::Skipped);
            }
            self.pending_resize = None;
            self.rebuild(extent)?;
        }
        if self.swapchain.extent().is_empty() {
            return Ok(FrameStatus::Skipped);
        }

        let slot = self.current_frame;
        self.frame_syncs[slot].wait()?;

        let image_index = match self.swapchain.acquire_next_image(self.frame_syncs[slot].as_ref()) {
            Ok(index) => index,
            Err(e) if e.is_surface_stale() => {
                engine_warn!("vista::Renderer", "Acquire reported {}; rebuilding", e);
                self.rebuild(self.target_extent)?;
                return Ok(FrameStatus::Rebuilt);
            }
            Err(e) => return Err(e),
        };

        // The image may still be in use by a frame submitted from another slot
        let image = image_index as usize;
        let owner = self.image_owners.get(image).copied().ok_or_else(|| {
            Error::InvalidResource(format!("acquired image {} out of range", image_index))
        })?;
        if let Some(owner) = owner {
            if owner != slot {
                self.frame_syncs[owner].wait()?;
            }
        }
        self.image_owners[image] = Some(slot);

        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("swapchain resources are missing".to_string()))?;

        resources.uniform_buffers[image].update(0, bytemuck::bytes_of(&self.camera.uniform()))?;
        resources.record(
            slot,
            image,
            self.models.values().map(|entry| &entry.model),
            &self.textures,
            &mut self.overlay,
            self.settings.clear_color,
        )?;

        // Reset only once a submission that signals the fence is certain
        let sync = self.frame_syncs[slot].as_ref();
        sync.reset()?;
        self.device.submit_frame(resources.command_lists[slot].as_ref(), sync)?;

        let presented = self.swapchain.present(image_index, sync);
        self.current_frame = (slot + 1) % self.frame_syncs.len();

        match presented {
            Ok(()) => {}
            Err(e) if e.is_surface_stale() => {
                engine_warn!("vista::Renderer", "Present reported {}; rebuilding", e);
                self.rebuild(self.target_extent)?;
                return Ok(FrameStatus::Rebuilt);
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        let delta = self.last_present.map(|last| now - last).unwrap_or(Duration::ZERO);
        self.last_present = Some(now);
        self.stats.record_frame(delta);

        Ok(FrameStatus::Presented { image_index })
    }

    /// Rebuild the chain against `extent` at the start of the next frame
    pub fn request_resize(&mut self, extent: Extent2D) {
        engine_debug!("vista::Renderer", "Resize requested: {}x{}", extent.width, extent.height);
        self.target_extent = extent;
        self.pending_resize = Some(extent);
    }

    /// Destroy and recreate the chain and everything built on it
    ///
    /// Waits for the device to go idle, drops the dependents, recreates the
    /// chain, then recreates the dependents in setup order. Meshes, textures
    /// and the texture descriptor pool are left alone.
    pub fn rebuild(&mut self, extent: Extent2D) -> Result<()> {
        engine_info!("vista::Renderer", "Rebuilding swapchain at {}x{}", extent.width, extent.height);

        self.device.wait_idle()?;
        self.resources = None;
        self.swapchain.recreate(extent)?;

        let resources = SwapchainResources::create(
            &FrameContext { device: self.device.as_ref(), settings: &self.settings, shaders: &self.shaders },
            self.swapchain.as_ref(),
        )?;
        self.image_owners = vec![None; resources.image_count()];
        self.resources = Some(resources);

        self.camera.set_aspect(self.swapchain.extent().aspect_ratio());
        self.stats.record_rebuild();
        Ok(())
    }

    /// Block until the device has finished every submitted frame
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    // ===== MODELS =====

    /// Upload an imported model
    ///
    /// Each material's diffuse texture is reduced to its file name, looked
    /// up in `texture_dir` and loaded through the texture cache. Meshes
    /// without a textured material use the default texture.
    pub fn create_mesh_model(&mut self, imported: &ImportedModel, texture_dir: &Path) -> Result<ModelKey> {
        let mut material_textures = Vec::with_capacity(imported.materials.len());
        for material in &imported.materials {
            let name = material.diffuse_texture.as_deref().map(texture_file_name).unwrap_or("");
            let id = if name.is_empty() {
                TextureId::DEFAULT
            } else {
                self.textures.get_or_load(texture_dir.join(name))?
            };
            material_textures.push(id);
        }

        let mut meshes = Vec::with_capacity(imported.meshes.len());
        for (index, imported_mesh) in imported.meshes.iter().enumerate() {
            if imported_mesh.indices.is_empty() {
                engine_debug!("vista::Renderer", "Skipping empty mesh {}", index);
                continue;
            }
            let texture = imported_mesh
                .material
                .and_then(|material| material_textures.get(material).copied())
                .unwrap_or(TextureId::DEFAULT);
            meshes.push(Mesh::new(self.device.as_ref(), &imported_mesh.vertices(), &imported_mesh.indices, texture)?);
        }

        engine_info!(
            "vista::Renderer",
            "Model loaded: {} meshes, {} materials",
            meshes.len(),
            imported.materials.len()
        );
        Ok(self.models.insert(ModelEntry::new(MeshModel::new(meshes))))
    }

    /// Import `path` and upload it; textures are looked up next to the file
    pub fn load_model(&mut self, path: &Path, importer: &dyn ModelImporter) -> Result<ModelKey> {
        let imported = importer.import(path)?;
        let texture_dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.create_mesh_model(&imported, texture_dir)
    }

    /// Upload a single mesh as a model
    ///
    /// `texture` must be a loaded slot; `InvalidResource` otherwise.
    pub fn add_mesh(&mut self, vertices: &[Vertex], indices: &[u32], texture: TextureId) -> Result<ModelKey> {
        self.textures.texture(texture)?;
        let mesh = Mesh::new(self.device.as_ref(), vertices, indices, texture)?;
        Ok(self.models.insert(ModelEntry::new(MeshModel::new(vec![mesh]))))
    }

    fn entry_mut(&mut self, key: ModelKey) -> Result<&mut ModelEntry> {
        self.models
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown model {:?}", key)))
    }

    pub fn mesh_model(&self, key: ModelKey) -> Result<&MeshModel> {
        self.models
            .get(key)
            .map(|entry| &entry.model)
            .ok_or_else(|| Error::InvalidResource(format!("unknown model {:?}", key)))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Set the model transform; a spin is applied on top of it
    pub fn set_model_transform(&mut self, key: ModelKey, transform: Mat4) -> Result<()> {
        let entry = self.entry_mut(key)?;
        entry.base_transform = transform;
        entry.apply_transform();
        Ok(())
    }

    /// Rotate the model continuously around `axis`, advanced by [`Renderer::update`]
    pub fn set_model_spin(&mut self, key: ModelKey, axis: Vec3, radians_per_second: f32) -> Result<()> {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return Err(Error::InvalidResource("spin axis must be non-zero".to_string()));
        }
        let entry = self.entry_mut(key)?;
        entry.spin = Some(Spin { axis, radians_per_second, angle: 0.0 });
        entry.apply_transform();
        Ok(())
    }

    /// Advance model animations by `delta`
    pub fn update(&mut self, delta: Duration) {
        let seconds = delta.as_secs_f32();
        for entry in self.models.values_mut() {
            if let Some(spin) = entry.spin.as_mut() {
                spin.angle = (spin.angle + spin.radians_per_second * seconds).rem_euclid(std::f32::consts::TAU);
                entry.apply_transform();
            }
        }
    }

    /// Destroy a model once the device no longer uses its buffers
    pub fn unload_model(&mut self, key: ModelKey) -> Result<()> {
        if !self.models.contains_key(key) {
            return Err(Error::InvalidResource(format!("unknown model {:?}", key)));
        }
        self.device.wait_idle()?;
        if let Some(entry) = self.models.remove(key) {
            entry.model.destroy();
        }
        Ok(())
    }

    // ===== TEXTURES, CAMERA, OVERLAY =====

    /// Load a texture through the cache (deduplicated by path)
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureId> {
        self.textures.get_or_load(path)
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Install the overlay recorded at the end of the scene subpass
    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlay = Some(overlay);
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    // ===== STATE =====

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Current chain extent
    pub fn extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    pub fn format(&self) -> TextureFormat {
        self.swapchain.format()
    }

    /// Frame slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn framebuffer_count(&self) -> usize {
        self.resources.as_ref().map(|r| r.framebuffers.len()).unwrap_or(0)
    }

    /// Viewport of the scene pipeline; `None` while the chain is being rebuilt
    pub fn pipeline_viewport(&self) -> Option<Extent2D> {
        self.resources.as_ref().map(|r| r.scene_pipeline.viewport())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_error!("vista::Renderer", "wait_idle failed during shutdown: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
