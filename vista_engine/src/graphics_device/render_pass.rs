/// Render pass trait and descriptors
///
/// A render pass is a list of attachments plus an ordered list of subpasses.
/// Backends derive the subpass dependencies from the order: external to the
/// first subpass, each subpass to the next one reading its output as an input
/// attachment, and the last subpass to external.

use std::any::Any;
use crate::error::{Error, Result};
use crate::graphics_device::TextureFormat;

/// What happens to an attachment at the start of the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Clear,
    Load,
    DontCare,
}

/// What happens to an attachment at the end of the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Role of the attachment once the pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentUsage {
    /// Handed to the presentation engine
    Present,
    /// Color attachment that is also read as an input attachment
    ColorAttachment,
    /// Depth attachment that is also read as an input attachment
    DepthAttachment,
}

/// One render pass attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub final_usage: AttachmentUsage,
}

/// One subpass; all fields are indices into [`RenderPassDesc::attachments`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassDesc {
    pub color_attachments: Vec<u32>,
    pub depth_attachment: Option<u32>,
    pub input_attachments: Vec<u32>,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDesc>,
    pub subpasses: Vec<SubpassDesc>,
}

impl RenderPassDesc {
    /// Check attachment indices and subpass ordering
    ///
    /// Every index must be in range, and an input attachment must have been
    /// written by an earlier subpass.
    pub fn validate(&self) -> Result<()> {
        if self.subpasses.is_empty() {
            return Err(Error::InvalidResource("render pass has no subpass".to_string()));
        }

        let count = self.attachments.len() as u32;
        let mut written: Vec<u32> = Vec::new();

        for (index, subpass) in self.subpasses.iter().enumerate() {
            for &attachment in subpass
                .color_attachments
                .iter()
                .chain(subpass.depth_attachment.iter())
                .chain(subpass.input_attachments.iter())
            {
                if attachment >= count {
                    return Err(Error::InvalidResource(format!(
                        "subpass {} references attachment {} but the pass has {}",
                        index, attachment, count
                    )));
                }
            }

            if let Some(depth) = subpass.depth_attachment {
                if !self.attachments[depth as usize].format.is_depth() {
                    return Err(Error::InvalidResource(format!(
                        "subpass {} uses non-depth attachment {} as depth",
                        index, depth
                    )));
                }
            }

            for &input in &subpass.input_attachments {
                if !written.contains(&input) {
                    return Err(Error::InvalidResource(format!(
                        "subpass {} reads attachment {} before any subpass writes it",
                        index, input
                    )));
                }
            }

            written.extend(subpass.color_attachments.iter().copied());
            written.extend(subpass.depth_attachment.iter().copied());
        }

        Ok(())
    }
}

/// Render pass trait
pub trait RenderPass: Send + Sync {
    fn subpass_count(&self) -> u32;

    /// Number of attachments a framebuffer for this pass must provide
    fn attachment_count(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
