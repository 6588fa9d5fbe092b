/// Command list trait - GPU command recording

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{
    BindingGroup, Buffer, Framebuffer, ImageLayout, Pipeline, RenderPass, Texture,
};

/// Clear value for one render pass attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Command list for recording GPU commands
///
/// Implementations validate their recording state (begin/end, inside a render
/// pass) and report misuse as errors.
pub trait CommandList: Send {
    /// Begin recording; resets whatever was recorded before
    fn begin(&mut self) -> Result<()>;

    /// End recording
    fn end(&mut self) -> Result<()>;

    /// Begin a render pass on `framebuffer`, one clear value per attachment
    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// Advance to the next subpass
    fn next_subpass(&mut self) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    /// Bind a descriptor set at `set_index` of `pipeline`'s layout
    fn bind_binding_group(
        &mut self,
        pipeline: &dyn Pipeline,
        set_index: u32,
        binding_group: &dyn BindingGroup,
    ) -> Result<()>;

    /// Write vertex-stage push constants
    fn push_constants(&mut self, pipeline: &dyn Pipeline, offset: u32, data: &[u8]) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    /// Bind an index buffer of `u32` indices
    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()>;

    /// Record an image layout transition barrier
    fn transition_texture(&mut self, texture: &dyn Texture, old: ImageLayout, new: ImageLayout) -> Result<()>;

    /// Copy tightly packed texels from `src` into the whole of `texture`
    ///
    /// The texture must be in `ImageLayout::TransferDst`.
    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, texture: &dyn Texture) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
