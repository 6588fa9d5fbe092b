/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the window surface and the chain of presentable images. Format,
/// present mode, image count and extent are picked by the shared selection
/// helpers from what the surface reports.

use ash::vk;
use std::sync::Arc;
use vista_engine::vista::render::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, Extent2D, FrameSync,
    Swapchain, Texture, TextureFormat, TextureInfo, TextureUsage,
};
use vista_engine::vista::{Error, Result, StaleReason};
use vista_engine::{engine_bail, engine_debug, engine_err, engine_info};

use crate::downcast;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    extent_to_vk, present_mode_from_vk, present_mode_to_vk, surface_capabilities_from_vk,
    surface_format_from_vk, texture_format_to_vk,
};
use crate::vulkan_sync::VulkanFrameSync;
use crate::vulkan_texture::{create_view, VulkanTexture};

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    views: Vec<Arc<VulkanTexture>>,
    format: TextureFormat,
    extent: Extent2D,
}

impl VulkanSwapchain {
    /// Build a chain on `surface`, which the swapchain owns from now on
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        requested: Extent2D,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let mut swapchain = Self {
            ctx,
            surface_loader,
            surface,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            views: Vec::new(),
            format: TextureFormat::B8G8R8A8_SRGB,
            extent: Extent2D::default(),
        };
        swapchain.build(requested)?;
        Ok(swapchain)
    }

    /// Create the chain against `requested`, retiring the current one
    fn build(&mut self, requested: Extent2D) -> Result<()> {
        let physical_device = self.ctx.physical_device;

        let (vk_caps, vk_formats, vk_modes) = unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to get surface capabilities: {:?}", e))?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to get surface formats: {:?}", e))?;
            let modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to get present modes: {:?}", e))?;
            (caps, formats, modes)
        };

        let caps = surface_capabilities_from_vk(&vk_caps);
        let formats: Vec<_> = vk_formats.iter().map(surface_format_from_vk).collect();
        let modes: Vec<_> = vk_modes.iter().filter_map(|&m| present_mode_from_vk(m)).collect();

        let Some((format_index, format)) =
            choose_surface_format(&formats).and_then(|i| formats[i].format.map(|f| (i, f)))
        else {
            engine_bail!("vista::vulkan", SurfaceUnsupported,
                "Surface offers no format the engine can render to ({} reported)", vk_formats.len());
        };
        let vk_surface_format = vk_formats[format_index];
        let present_mode = choose_present_mode(&modes);
        let image_count = choose_image_count(&caps);
        let extent = choose_extent(&caps, requested);

        let queue_families = [self.ctx.graphics_queue_family, self.ctx.present_queue_family];
        let old_swapchain = self.swapchain;

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(vk_surface_format.format)
            .image_color_space(vk_surface_format.color_space)
            .image_extent(extent_to_vk(extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(vk_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(present_mode))
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if queue_families[0] != queue_families[1] {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            self.swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to create swapchain: {:?}", e))?
        };

        // The retired chain and its views go away once the new one exists
        self.views.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        let images = unsafe {
            self.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to get swapchain images: {:?}", e))?
        };

        let info = TextureInfo {
            width: extent.width,
            height: extent.height,
            format,
            usage: TextureUsage::ColorAttachment,
        };
        for image in images {
            let view = create_view(&self.ctx.device, image, texture_format_to_vk(format), vk::ImageAspectFlags::COLOR)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create swapchain image view: {:?}", e))?;
            self.views.push(Arc::new(VulkanTexture::view_of(Arc::clone(&self.ctx), image, view, info)));
        }

        self.format = format;
        self.extent = extent;

        engine_info!(
            "vista::vulkan",
            "Swapchain ready: {} images, {}x{}, {:?}, {:?}",
            self.views.len(),
            extent.width,
            extent.height,
            format,
            present_mode
        );
        Ok(())
    }

    /// Destroy the chain and the surface; safe to call more than once
    pub fn cleanup(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.views.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
                self.surface = vk::SurfaceKHR::null();
            }
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, sync: &dyn FrameSync) -> Result<u32> {
        let sync: &VulkanFrameSync = downcast(sync.as_any(), "frame sync")?;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    engine_debug!("vista::vulkan", "Suboptimal acquire of image {}", index);
                }
                Ok(index)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SurfaceStale(StaleReason::OutOfDate)),
            Err(e) => Err(engine_err!("vista::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, sync: &dyn FrameSync) -> Result<()> {
        if image_index as usize >= self.views.len() {
            return Err(Error::InvalidResource(format!(
                "image {} out of range ({} images)",
                image_index,
                self.views.len()
            )));
        }
        let sync: &VulkanFrameSync = downcast(sync.as_any(), "frame sync")?;

        let wait_semaphores = [sync.render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) };

        match result {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Err(Error::SurfaceStale(StaleReason::Suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SurfaceStale(StaleReason::OutOfDate)),
            Err(e) => Err(engine_err!("vista::vulkan", "Failed to present: {:?}", e)),
        }
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        if let Some(index) = self.views.iter().position(|view| Arc::strong_count(view) > 1) {
            return Err(Error::InvalidResource(format!(
                "swapchain image view {} is still referenced",
                index
            )));
        }
        self.build(extent)
    }

    fn image_count(&self) -> u32 {
        self.views.len() as u32
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn image_view(&self, index: u32) -> Result<Arc<dyn Texture>> {
        self.views
            .get(index as usize)
            .map(|view| Arc::clone(view) as Arc<dyn Texture>)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "swapchain image {} out of range ({} images)",
                    index,
                    self.views.len()
                ))
            })
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        self.cleanup();
    }
}
