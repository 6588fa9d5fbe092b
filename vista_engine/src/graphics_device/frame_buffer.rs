/// Framebuffer trait and descriptor

use std::any::Any;
use std::sync::Arc;
use crate::graphics_device::{RenderPass, Texture};

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    /// Pass the framebuffer is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// Views, in the pass's attachment order
    pub attachments: Vec<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
}

/// Framebuffer trait
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
