/// VulkanCommandList - Vulkan implementation of the CommandList trait
///
/// Frame-loop lists own a resettable command pool. One-shot lists borrow a
/// buffer from the shared upload pool and give it back when dropped.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{
    check_range, BindingGroup, Buffer, BufferUsage, ClearValue, CommandList, Framebuffer, ImageLayout,
    MemoryLocation, Pipeline, RenderPass, Texture,
};
use vista_engine::vista::{Error, Result};
use vista_engine::engine_err;

use crate::downcast;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_pool::VulkanBindingGroup;
use crate::vulkan_format::{aspect_mask, image_layout_to_vk, read_aspect_mask};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::VulkanTexture;

/// Where the command buffer came from
enum CommandSource {
    /// Pool owned by this list (frame loop)
    Owned(vk::CommandPool),
    /// Buffer allocated from the context's upload pool
    Upload,
}

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    source: CommandSource,
    command_buffer: vk::CommandBuffer,
    recording: bool,
    in_render_pass: bool,
    subpass: u32,
    subpass_count: u32,
    bound_subpass: Option<u32>,
}

fn backend_error(message: &str) -> Error {
    Error::BackendError(message.to_string())
}

impl VulkanCommandList {
    /// Command list with its own pool, for per-frame recording
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe {
            ctx.device
                .create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create command pool: {:?}", e))?
        };

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = match unsafe { ctx.device.allocate_command_buffers(&allocate_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { ctx.device.destroy_command_pool(command_pool, None) };
                return Err(engine_err!("vista::vulkan", "Failed to allocate command buffer: {:?}", e));
            }
        };

        Ok(Self::with_buffer(ctx, CommandSource::Owned(command_pool), command_buffer))
    }

    /// Command list from the upload pool, already recording with ONE_TIME_SUBMIT
    pub(crate) fn one_shot(ctx: Arc<GpuContext>) -> Result<Self> {
        let command_buffer = {
            let pool = ctx.upload_pool()?;
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            unsafe {
                ctx.device
                    .allocate_command_buffers(&allocate_info)
                    .map_err(|e| engine_err!("vista::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0]
            }
        };

        let mut list = Self::with_buffer(ctx, CommandSource::Upload, command_buffer);
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            list.ctx
                .device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to begin upload command buffer: {:?}", e))?;
        }
        list.recording = true;
        Ok(list)
    }

    fn with_buffer(ctx: Arc<GpuContext>, source: CommandSource, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            ctx,
            source,
            command_buffer,
            recording: false,
            in_render_pass: false,
            subpass: 0,
            subpass_count: 0,
            bound_subpass: None,
        }
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording
    }

    fn require_recording(&self) -> Result<()> {
        if !self.recording {
            return Err(backend_error("Command list not recording"));
        }
        Ok(())
    }

    fn require_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(backend_error("Not inside a render pass"));
        }
        Ok(())
    }

    fn require_outside_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("Transfer command inside a render pass"));
        }
        Ok(())
    }

    fn require_pipeline(&self) -> Result<()> {
        if self.bound_subpass != Some(self.subpass) {
            return Err(Error::BackendError(format!("No pipeline bound for subpass {}", self.subpass)));
        }
        Ok(())
    }
}

/// Stage and access masks for a layout transition
fn transition_masks(
    old: ImageLayout,
    new: ImageLayout,
) -> (vk::PipelineStageFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::AccessFlags) {
    match (old, new) {
        (ImageLayout::Undefined, ImageLayout::TransferDst) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
        ),
        (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        _ => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        ),
    }
}

/// Makes transfer writes visible to host reads of a readback buffer
fn readback_barrier(location: MemoryLocation) -> Option<vk::BufferMemoryBarrier<'static>> {
    (location == MemoryLocation::GpuToCpu).then(|| {
        vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::HOST_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .offset(0)
    })
}

fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(backend_error("Command list already recording"));
        }

        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.recording = true;
        self.in_render_pass = false;
        self.bound_subpass = None;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("end() inside a render pass"));
        }

        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }

        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("Render pass already begun"));
        }
        if clear_values.len() as u32 != render_pass.attachment_count() {
            return Err(Error::InvalidResource(format!(
                "{} clear values for {} attachments",
                clear_values.len(),
                render_pass.attachment_count()
            )));
        }

        let vk_render_pass: &VulkanRenderPass = downcast(render_pass.as_any(), "render pass")?;
        let vk_framebuffer: &VulkanFramebuffer = downcast(framebuffer.as_any(), "framebuffer")?;

        let vk_clear_values: Vec<vk::ClearValue> = clear_values.iter().map(clear_value_to_vk).collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: framebuffer.width(),
                    height: framebuffer.height(),
                },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }

        self.in_render_pass = true;
        self.subpass = 0;
        self.subpass_count = render_pass.subpass_count();
        self.bound_subpass = None;
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.require_render_pass()?;
        if self.subpass + 1 >= self.subpass_count {
            return Err(backend_error("No subpass left"));
        }

        unsafe {
            self.ctx.device.cmd_next_subpass(self.command_buffer, vk::SubpassContents::INLINE);
        }

        self.subpass += 1;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass()?;
        if self.subpass + 1 != self.subpass_count {
            return Err(backend_error("Render pass ended before its last subpass"));
        }

        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }

        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.require_render_pass()?;
        if pipeline.subpass() != self.subpass {
            return Err(Error::BackendError(format!(
                "Pipeline for subpass {} bound in subpass {}",
                pipeline.subpass(),
                self.subpass
            )));
        }

        let vk_pipeline: &VulkanPipeline = downcast(pipeline.as_any(), "pipeline")?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }

        self.bound_subpass = Some(self.subpass);
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &dyn Pipeline,
        set_index: u32,
        binding_group: &dyn BindingGroup,
    ) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;
        match pipeline.binding_layouts().get(set_index as usize) {
            Some(layout) if *layout == binding_group.layout() => {}
            expected => {
                return Err(Error::InvalidResource(format!(
                    "set {} expects {:?}, got {:?}",
                    set_index,
                    expected,
                    binding_group.layout()
                )))
            }
        }

        let vk_pipeline: &VulkanPipeline = downcast(pipeline.as_any(), "pipeline")?;
        let vk_group: &VulkanBindingGroup = downcast(binding_group.as_any(), "binding group")?;

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline_layout,
                set_index,
                &[vk_group.descriptor_set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &dyn Pipeline, offset: u32, data: &[u8]) -> Result<()> {
        self.require_render_pass()?;
        if offset as usize + data.len() > pipeline.push_constant_size() as usize {
            return Err(Error::InvalidResource(format!(
                "push constant range {}+{} exceeds {}",
                offset,
                data.len(),
                pipeline.push_constant_size()
            )));
        }

        let vk_pipeline: &VulkanPipeline = downcast(pipeline.as_any(), "pipeline")?;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_pipeline.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.require_render_pass()?;
        if buffer.usage() != BufferUsage::Vertex {
            return Err(Error::InvalidResource("not a vertex buffer".to_string()));
        }

        let vk_buffer: &VulkanBuffer = downcast(buffer.as_any(), "vertex buffer")?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.require_render_pass()?;
        if buffer.usage() != BufferUsage::Index {
            return Err(Error::InvalidResource("not an index buffer".to_string()));
        }

        let vk_buffer: &VulkanBuffer = downcast(buffer.as_any(), "index buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                vk::IndexType::UINT32,
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;

        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;

        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()> {
        self.require_outside_render_pass()?;
        check_range(src.size(), 0, size)?;
        check_range(dst.size(), 0, size)?;

        let vk_src: &VulkanBuffer = downcast(src.as_any(), "source buffer")?;
        let vk_dst: &VulkanBuffer = downcast(dst.as_any(), "destination buffer")?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.ctx
                .device
                .cmd_copy_buffer(self.command_buffer, vk_src.buffer, vk_dst.buffer, &[region]);
        }

        if let Some(barrier) = readback_barrier(dst.location()) {
            let barrier = barrier.buffer(vk_dst.buffer).size(size);
            unsafe {
                self.ctx.device.cmd_pipeline_barrier(
                    self.command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::HOST,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[barrier],
                    &[],
                );
            }
        }
        Ok(())
    }

    fn transition_texture(&mut self, texture: &dyn Texture, old: ImageLayout, new: ImageLayout) -> Result<()> {
        self.require_outside_render_pass()?;
        let vk_texture: &VulkanTexture = downcast(texture.as_any(), "texture")?;

        let (src_stage, src_access, dst_stage, dst_access) = transition_masks(old, new);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(old))
            .new_layout(image_layout_to_vk(new))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vk_texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(texture.info().format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, texture: &dyn Texture) -> Result<()> {
        self.require_outside_render_pass()?;
        let info = texture.info();
        check_range(src.size(), 0, info.byte_size())?;

        let vk_src: &VulkanBuffer = downcast(src.as_any(), "source buffer")?;
        let vk_texture: &VulkanTexture = downcast(texture.as_any(), "texture")?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: read_aspect_mask(info.format),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: info.width,
                height: info.height,
                depth: 1,
            });

        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_src.buffer,
                vk_texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            match self.source {
                CommandSource::Owned(pool) => {
                    self.ctx.device.destroy_command_pool(pool, None);
                }
                CommandSource::Upload => {
                    if let Ok(pool) = self.ctx.upload_pool() {
                        self.ctx.device.free_command_buffers(*pool, &[self.command_buffer]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
