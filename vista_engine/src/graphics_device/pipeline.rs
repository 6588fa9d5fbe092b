/// Pipeline trait and pipeline descriptor

use std::any::Any;
use std::sync::Arc;
use crate::graphics_device::{BindingLayout, Extent2D, RenderPass, Shader};

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// vec2 of f32
    Float2,
    /// vec3 of f32
    Float3,
}

impl VertexFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::Float2 => 8,
            VertexFormat::Float3 => 12,
        }
    }
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader location
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset inside the vertex
    pub offset: u32,
}

/// Per-vertex layout of the single vertex binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
}

/// Winding order of front faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Descriptor for creating a graphics pipeline
///
/// Viewport and scissor are static and cover `viewport`; pipelines are
/// rebuilt with the presentable chain.
#[derive(Clone)]
pub struct PipelineDesc {
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    /// `None` for pipelines that generate their vertices (fullscreen triangle)
    pub vertex_layout: Option<VertexLayout>,
    pub render_pass: Arc<dyn RenderPass>,
    /// Subpass index inside `render_pass`
    pub subpass: u32,
    /// Set layouts; set `i` uses `binding_layouts[i]`
    pub binding_layouts: Vec<BindingLayout>,
    /// Size in bytes of the vertex-stage push constant range at offset 0
    pub push_constant_size: u32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub viewport: Extent2D,
}

/// Graphics pipeline trait
pub trait Pipeline: Send + Sync {
    /// Extent of the static viewport and scissor
    fn viewport(&self) -> Extent2D;

    fn subpass(&self) -> u32;

    fn binding_layouts(&self) -> &[BindingLayout];

    fn push_constant_size(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
