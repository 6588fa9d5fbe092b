/// VulkanTexture - Vulkan implementation of the Texture trait
///
/// Owns its views always; owns the image and its memory only when created by
/// the device. Swapchain image views wrap images owned by the swapchain.
/// Depth-stencil textures carry a second, depth-only view for shader reads.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{Texture, TextureInfo};

use crate::vulkan_context::GpuContext;

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// Depth-only view of a depth-stencil image
    read_view: Option<vk::ImageView>,
    /// `None` for swapchain images
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl VulkanTexture {
    /// Texture owning image, memory and view
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        read_view: Option<vk::ImageView>,
        allocation: Allocation,
        info: TextureInfo,
    ) -> Self {
        Self {
            ctx,
            image,
            view,
            read_view,
            allocation: Some(allocation),
            owns_image: true,
            info,
        }
    }

    /// View over an image owned elsewhere (swapchain)
    pub(crate) fn view_of(ctx: Arc<GpuContext>, image: vk::Image, view: vk::ImageView, info: TextureInfo) -> Self {
        Self {
            ctx,
            image,
            view,
            read_view: None,
            allocation: None,
            owns_image: false,
            info,
        }
    }

    /// View for input attachment and sampled reads
    pub(crate) fn read_view(&self) -> vk::ImageView {
        self.read_view.unwrap_or(self.view)
    }
}

/// Create a 2D view covering the single mip and layer of `image`
pub(crate) fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> ash::prelude::VkResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }
}

impl Texture for VulkanTexture {
    fn info(&self) -> TextureInfo {
        self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if let Some(read_view) = self.read_view {
                self.ctx.device.destroy_image_view(read_view, None);
            }
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
