/*!
# Vista Engine - Vulkan Backend

Vulkan implementation of the `vista_engine` GPU abstraction.

This crate implements the `graphics_device` traits using the Ash library for
Vulkan bindings and gpu-allocator for memory management. Every object it
hands out shares one [`GpuContext`](vulkan_context::GpuContext), so the
logical device outlives everything built on it.

```no_run
use vista_engine::vista::config::EngineConfig;
use vista_engine::vista::render::Extent2D;
use vista_engine_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> vista_engine::vista::Result<()> {
let device = VulkanGraphicsDevice::new(window, &EngineConfig::default())?;
let swapchain = device.create_swapchain(window, Extent2D::new(1280, 720))?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_frame_buffer;
mod vulkan_descriptor_pool;
mod vulkan_command_list;
mod vulkan_sync;
mod vulkan_swapchain;
mod debug;

use std::any::Any;
use vista_engine::vista::{Error, Result};

pub use vulkan::VulkanGraphicsDevice;
pub use vulkan_swapchain::VulkanSwapchain;
pub use debug::{validation_stats, print_validation_stats_report, ValidationStats};

/// Downcast a trait object handed back by the orchestrator to the backend type
///
/// Objects from another backend (or a mock) are rejected with `InvalidResource`.
pub(crate) fn downcast<'a, T: 'static>(object: &'a dyn Any, what: &str) -> Result<&'a T> {
    object.downcast_ref::<T>().ok_or_else(|| {
        Error::InvalidResource(format!("{} was not created by the Vulkan backend", what))
    })
}
