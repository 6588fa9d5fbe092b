/// Overlay hook
///
/// Lets a debug UI record its own draws into the frame after the meshes and
/// before the composite subpass. The engine only calls the hook; rendering
/// the UI is up to the implementation.

use crate::error::Result;
use crate::graphics_device::{CommandList, RenderPass};

pub trait Overlay: Send {
    /// Record overlay draws
    ///
    /// Called inside the scene subpass of `render_pass` with the scene
    /// pipeline still bound. Implementations bind their own pipeline.
    fn record(&mut self, cmd: &mut dyn CommandList, render_pass: &dyn RenderPass) -> Result<()>;
}
