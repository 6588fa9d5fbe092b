/// GraphicsDevice trait - GPU resource factory and queue access

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, DescriptorPool, DescriptorPoolDesc, FrameSync, Framebuffer,
    FramebufferDesc, Pipeline, PipelineDesc, RenderPass, RenderPassDesc, Shader, ShaderDesc, Texture,
    TextureDesc, TextureFormat,
};

/// Main graphics device trait
///
/// Central factory for GPU objects, implemented by backends (e.g.,
/// VulkanGraphicsDevice). Every object it creates keeps the underlying device
/// alive, so the device is destroyed only after the last of them is dropped.
///
/// All methods are called from the single submission thread.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    ///
    /// # Arguments
    ///
    /// * `desc` - Size, usage and memory placement
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a texture (image + view)
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a shader module from a SPIR-V binary
    ///
    /// Fails with `ShaderLoad` for malformed binaries.
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a render pass; the descriptor is validated first
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a graphics pipeline
    ///
    /// Fails with `PipelineCreation` when the shaders do not match the
    /// declared binding layouts and push constant size.
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>>;

    /// Create a resettable command list for the frame loop
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Create the synchronization objects of one frame-in-flight slot
    fn create_frame_sync(&self) -> Result<Box<dyn FrameSync>>;

    /// Allocate a short-lived command list, already recording
    fn begin_one_shot(&self) -> Result<Box<dyn CommandList>>;

    /// End, submit and wait for a list from [`GraphicsDevice::begin_one_shot`]
    ///
    /// Blocks on a dedicated fence, then frees the list and the fence. Only
    /// used on upload paths, never in the frame loop.
    fn submit_one_shot(&self, cmd: Box<dyn CommandList>) -> Result<()>;

    /// Synchronous buffer-to-buffer copy of `size` bytes
    fn copy_buffer(&self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()> {
        let mut cmd = self.begin_one_shot()?;
        cmd.copy_buffer(src, dst, size)?;
        self.submit_one_shot(cmd)
    }

    /// Submit a recorded frame on the graphics queue
    ///
    /// Waits on `sync`'s image-acquired semaphore at the color output stage,
    /// signals its rendering-finished semaphore and its fence.
    fn submit_frame(&self, cmd: &dyn CommandList, sync: &dyn FrameSync) -> Result<()>;

    /// Block until the device has no pending work
    fn wait_idle(&self) -> Result<()>;

    /// Format of the off-screen color attachments
    fn color_attachment_format(&self) -> TextureFormat;

    /// Best supported depth attachment format
    fn depth_format(&self) -> TextureFormat;
}
