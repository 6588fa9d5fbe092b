/// VulkanBuffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{check_range, Buffer, BufferUsage, MemoryLocation};
use vista_engine::vista::{Error, Result};
use vista_engine::engine_error;

use crate::vulkan_context::GpuContext;

pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
    location: MemoryLocation,
}

impl VulkanBuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            location,
        }
    }

    /// Host pointer of the persistently mapped allocation
    fn mapped_ptr(&self) -> Result<*mut u8> {
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("vista::vulkan", "Buffer access failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;
        allocation
            .mapped_ptr()
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| {
                Error::InvalidResource(format!("{:?} buffer in {:?} memory is not CPU-accessible", self.usage, self.location))
            })
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn location(&self) -> MemoryLocation {
        self.location
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(self.size, offset, data.len() as u64)?;
        let mapped = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        check_range(self.size, offset, len)?;
        let mapped = self.mapped_ptr()?;
        let mut out = vec![0u8; len as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(mapped.add(offset as usize), out.as_mut_ptr(), len as usize);
        }
        Ok(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory; still destroy the buffer if the lock fails
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
