/// Everything that depends on the presentable chain
///
/// Built in one go after the chain and dropped in one go before it is
/// recreated. Construction order: render pass, scene pipeline, composite
/// pipeline, off-screen attachments, framebuffers, camera uniforms and sets,
/// input attachment sets, command lists. Fields are declared in the reverse
/// order so dropping the struct destroys dependents before what they use.
///
/// Dropping is only valid once the device is idle.

use std::sync::Arc;
use crate::camera::CameraUniform;
use crate::config::RendererSettings;
use crate::error::Result;
use crate::graphics_device::{
    BindingGroup, BindingLayout, BindingResource, Buffer, BufferDesc, BufferUsage, CommandList, CullMode,
    DescriptorPool, DescriptorPoolDesc, Extent2D, Framebuffer, FramebufferDesc, FrontFace, GraphicsDevice,
    MemoryLocation, Pipeline, PipelineDesc, RenderPass, Swapchain, Texture, TextureDesc, TextureUsage,
};
use crate::renderer::render_graph::{clear_values, scene_render_pass, COMPOSITE_SUBPASS, SCENE_SUBPASS};
use crate::renderer::shader_sources::ShaderModules;
use crate::renderer::Overlay;
use crate::resource::{MeshModel, TextureCache, Vertex};
use crate::engine_debug;

/// Bytes of the model matrix pushed per mesh
pub const MODEL_PUSH_CONSTANT_SIZE: u32 = 64;

/// What setup functions need from the renderer
pub(crate) struct FrameContext<'a> {
    pub device: &'a dyn GraphicsDevice,
    pub settings: &'a RendererSettings,
    pub shaders: &'a ShaderModules,
}

pub(crate) struct SwapchainResources {
    /// One per frame-in-flight slot
    pub command_lists: Vec<Box<dyn CommandList>>,
    pub input_sets: Vec<Arc<dyn BindingGroup>>,
    pub input_pool: Arc<dyn DescriptorPool>,
    pub camera_sets: Vec<Arc<dyn BindingGroup>>,
    pub camera_pool: Arc<dyn DescriptorPool>,
    /// One per chain image
    pub uniform_buffers: Vec<Arc<dyn Buffer>>,
    pub framebuffers: Vec<Arc<dyn Framebuffer>>,
    pub depth_attachments: Vec<Arc<dyn Texture>>,
    pub color_attachments: Vec<Arc<dyn Texture>>,
    pub composite_pipeline: Arc<dyn Pipeline>,
    pub scene_pipeline: Arc<dyn Pipeline>,
    pub render_pass: Arc<dyn RenderPass>,
    pub extent: Extent2D,
}

impl SwapchainResources {
    pub fn create(ctx: &FrameContext, swapchain: &dyn Swapchain) -> Result<Self> {
        let device = ctx.device;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let render_pass = device.create_render_pass(&scene_render_pass(
            swapchain.format(),
            device.color_attachment_format(),
            device.depth_format(),
        ))?;

        let scene_pipeline = device.create_pipeline(&PipelineDesc {
            vertex_shader: Arc::clone(&ctx.shaders.scene_vertex),
            fragment_shader: Arc::clone(&ctx.shaders.scene_fragment),
            vertex_layout: Some(Vertex::layout()),
            render_pass: Arc::clone(&render_pass),
            subpass: SCENE_SUBPASS,
            binding_layouts: vec![BindingLayout::Camera, BindingLayout::Texture],
            push_constant_size: MODEL_PUSH_CONSTANT_SIZE,
            depth_test: true,
            depth_write: true,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            viewport: extent,
        })?;

        let composite_pipeline = device.create_pipeline(&PipelineDesc {
            vertex_shader: Arc::clone(&ctx.shaders.composite_vertex),
            fragment_shader: Arc::clone(&ctx.shaders.composite_fragment),
            vertex_layout: None,
            render_pass: Arc::clone(&render_pass),
            subpass: COMPOSITE_SUBPASS,
            binding_layouts: vec![BindingLayout::InputAttachments],
            push_constant_size: 0,
            depth_test: false,
            depth_write: false,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            viewport: extent,
        })?;

        // ===== OFF-SCREEN ATTACHMENTS + FRAMEBUFFERS =====

        let mut color_attachments = Vec::with_capacity(image_count as usize);
        let mut depth_attachments = Vec::with_capacity(image_count as usize);
        for _ in 0..image_count {
            color_attachments.push(device.create_texture(TextureDesc {
                width: extent.width,
                height: extent.height,
                format: device.color_attachment_format(),
                usage: TextureUsage::ColorAttachment,
            })?);
            depth_attachments.push(device.create_texture(TextureDesc {
                width: extent.width,
                height: extent.height,
                format: device.depth_format(),
                usage: TextureUsage::DepthAttachment,
            })?);
        }

        let mut framebuffers = Vec::with_capacity(image_count as usize);
        for index in 0..image_count {
            let i = index as usize;
            framebuffers.push(device.create_framebuffer(&FramebufferDesc {
                render_pass: Arc::clone(&render_pass),
                attachments: vec![
                    swapchain.image_view(index)?,
                    Arc::clone(&color_attachments[i]),
                    Arc::clone(&depth_attachments[i]),
                ],
                width: extent.width,
                height: extent.height,
            })?);
        }

        // ===== PER-IMAGE DESCRIPTOR SETS =====

        let mut uniform_buffers = Vec::with_capacity(image_count as usize);
        for _ in 0..image_count {
            uniform_buffers.push(device.create_buffer(BufferDesc {
                size: std::mem::size_of::<CameraUniform>() as u64,
                usage: BufferUsage::Uniform,
                location: MemoryLocation::CpuToGpu,
            })?);
        }

        let camera_pool = device.create_descriptor_pool(DescriptorPoolDesc {
            layout: BindingLayout::Camera,
            max_sets: image_count,
        })?;
        let camera_sets = uniform_buffers
            .iter()
            .map(|buffer| camera_pool.allocate(&[BindingResource::UniformBuffer(buffer.as_ref())]))
            .collect::<Result<Vec<_>>>()?;

        let input_pool = device.create_descriptor_pool(DescriptorPoolDesc {
            layout: BindingLayout::InputAttachments,
            max_sets: image_count,
        })?;
        let input_sets = color_attachments
            .iter()
            .zip(&depth_attachments)
            .map(|(color, depth)| {
                input_pool.allocate(&[
                    BindingResource::InputAttachment(color.as_ref()),
                    BindingResource::InputAttachment(depth.as_ref()),
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        let command_lists = (0..ctx.settings.frames_in_flight)
            .map(|_| device.create_command_list())
            .collect::<Result<Vec<_>>>()?;

        engine_debug!(
            "vista::Renderer",
            "Swapchain resources ready: {}x{}, {} images, {} command lists",
            extent.width,
            extent.height,
            image_count,
            command_lists.len()
        );

        Ok(Self {
            command_lists,
            input_sets,
            input_pool,
            camera_sets,
            camera_pool,
            uniform_buffers,
            framebuffers,
            depth_attachments,
            color_attachments,
            composite_pipeline,
            scene_pipeline,
            render_pass,
            extent,
        })
    }

    pub fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Record one frame into the command list of `slot`, targeting chain image `image`
    ///
    /// Subpass 0 draws every mesh with its model transform as push constant,
    /// the image's camera set at set 0 and the mesh texture at set 1, then
    /// lets the overlay record. Subpass 1 draws the fullscreen composite.
    pub fn record<'a>(
        &mut self,
        slot: usize,
        image: usize,
        models: impl Iterator<Item = &'a MeshModel>,
        textures: &TextureCache,
        overlay: &mut Option<Box<dyn Overlay>>,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let cmd = self.command_lists[slot].as_mut();
        let scene = self.scene_pipeline.as_ref();
        let camera_set = self.camera_sets[image].as_ref();

        cmd.begin()?;
        cmd.begin_render_pass(self.render_pass.as_ref(), self.framebuffers[image].as_ref(), &clear_values(clear_color))?;

        cmd.bind_pipeline(scene)?;
        for model in models {
            let transform = model.transform().to_cols_array();
            for mesh in model.meshes() {
                cmd.bind_vertex_buffer(mesh.vertex_buffer()?.as_ref(), 0)?;
                cmd.bind_index_buffer(mesh.index_buffer()?.as_ref(), 0)?;
                cmd.push_constants(scene, 0, bytemuck::cast_slice(&transform))?;
                cmd.bind_binding_group(scene, 0, camera_set)?;
                cmd.bind_binding_group(scene, 1, textures.binding_group(mesh.texture_id())?.as_ref())?;
                cmd.draw_indexed(mesh.index_count(), 0, 0)?;
            }
        }
        if let Some(overlay) = overlay.as_mut() {
            overlay.record(cmd, self.render_pass.as_ref())?;
        }

        cmd.next_subpass()?;
        let composite = self.composite_pipeline.as_ref();
        cmd.bind_pipeline(composite)?;
        cmd.bind_binding_group(composite, 0, self.input_sets[image].as_ref())?;
        // Fullscreen triangle generated in the vertex shader
        cmd.draw(3, 0)?;

        cmd.end_render_pass()?;
        cmd.end()
    }
}

#[cfg(test)]
#[path = "swapchain_resources_tests.rs"]
mod tests;
