/// Renderer module - the frame orchestrator and what it builds per chain
///
/// [`Renderer`] owns the frame loop. The render graph, the chain-dependent
/// resource set and the shader modules are internal building blocks; the
/// overlay hook and frame statistics are part of the public surface.

mod frame_stats;
mod overlay;
mod render_graph;
mod renderer;
mod shader_sources;
mod swapchain_resources;

pub use frame_stats::FrameStats;
pub use overlay::Overlay;
pub use render_graph::{
    clear_values, scene_render_pass, COLOR_ATTACHMENT, COMPOSITE_SUBPASS, DEPTH_ATTACHMENT, PRESENT_ATTACHMENT,
    SCENE_SUBPASS,
};
pub use renderer::{FrameStatus, ModelKey, Renderer};
pub use shader_sources::ShaderSources;
pub use swapchain_resources::MODEL_PUSH_CONSTANT_SIZE;
