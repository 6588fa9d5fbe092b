/// VulkanFramebuffer - Vulkan implementation of the Framebuffer trait
///
/// Keeps its attachment views and its render pass alive for as long as the
/// VkFramebuffer exists.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{Framebuffer, FramebufferDesc, RenderPass, Texture};
use vista_engine::vista::Result;
use vista_engine::{engine_bail, engine_err};

use crate::downcast;
use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    _render_pass: Arc<dyn RenderPass>,
    _attachments: Vec<Arc<dyn Texture>>,
}

impl VulkanFramebuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &FramebufferDesc) -> Result<Self> {
        let render_pass: &VulkanRenderPass = downcast(desc.render_pass.as_any(), "render pass")?;

        if desc.attachments.len() as u32 != render_pass.attachment_count() {
            engine_bail!("vista::vulkan", InvalidResource,
                "Framebuffer has {} attachment(s), the render pass expects {}",
                desc.attachments.len(), render_pass.attachment_count());
        }

        let mut views = Vec::with_capacity(desc.attachments.len());
        for (index, attachment) in desc.attachments.iter().enumerate() {
            let texture: &VulkanTexture = downcast(attachment.as_any(), "framebuffer attachment")?;
            let info = texture.info();
            if info.width < desc.width || info.height < desc.height {
                engine_bail!("vista::vulkan", InvalidResource,
                    "Attachment {} is {}x{}, smaller than the {}x{} framebuffer",
                    index, info.width, info.height, desc.width, desc.height);
            }
            views.push(texture.view);
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device
                .create_framebuffer(&create_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create framebuffer: {:?}", e))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            width: desc.width,
            height: desc.height,
            _render_pass: Arc::clone(&desc.render_pass),
            _attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
