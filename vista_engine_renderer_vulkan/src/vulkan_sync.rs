/// VulkanFrameSync - fence and semaphores of one frame-in-flight slot

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::FrameSync;
use vista_engine::vista::{Error, Result};
use vista_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub struct VulkanFrameSync {
    ctx: Arc<GpuContext>,
    /// Created signaled so the first wait returns immediately
    pub(crate) in_flight: vk::Fence,
    pub(crate) image_available: vk::Semaphore,
    pub(crate) render_finished: vk::Semaphore,
}

impl VulkanFrameSync {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        // Null handles are ignored by the destroy calls in Drop
        let mut sync = Self {
            ctx: Arc::clone(&ctx),
            in_flight: vk::Fence::null(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
        };

        unsafe {
            sync.image_available = ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create image-acquired semaphore: {:?}", e))?;
            sync.render_finished = ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create rendering-finished semaphore: {:?}", e))?;
            sync.in_flight = ctx
                .device
                .create_fence(&fence_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create frame fence: {:?}", e))?;
        }

        Ok(sync)
    }
}

impl FrameSync for VulkanFrameSync {
    fn wait(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.in_flight], true, u64::MAX)
                .map_err(|e| Error::BackendError(format!("Failed to wait for frame fence: {:?}", e)))
        }
    }

    fn reset(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[self.in_flight])
                .map_err(|e| Error::BackendError(format!("Failed to reset frame fence: {:?}", e)))
        }
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe {
            self.ctx
                .device
                .get_fence_status(self.in_flight)
                .map_err(|e| Error::BackendError(format!("Failed to query frame fence: {:?}", e)))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFrameSync {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.in_flight, None);
            self.ctx.device.destroy_semaphore(self.image_available, None);
            self.ctx.device.destroy_semaphore(self.render_finished, None);
        }
    }
}
