/// Render graph - the fixed two-subpass pass every frame goes through
///
/// Subpass 0 draws the scene into an off-screen color attachment and a depth
/// attachment. Subpass 1 reads both as input attachments and writes the
/// presentable image with a fullscreen triangle.

use crate::graphics_device::{
    AttachmentDesc, AttachmentUsage, ClearValue, LoadOp, RenderPassDesc, StoreOp, SubpassDesc,
    TextureFormat,
};

/// Subpass that draws the meshes
pub const SCENE_SUBPASS: u32 = 0;
/// Subpass that composites the off-screen attachments to the presentable image
pub const COMPOSITE_SUBPASS: u32 = 1;

/// Attachment indices, also the framebuffer view order
pub const PRESENT_ATTACHMENT: u32 = 0;
pub const COLOR_ATTACHMENT: u32 = 1;
pub const DEPTH_ATTACHMENT: u32 = 2;

/// Clear depth, the far plane
pub const CLEAR_DEPTH: f32 = 1.0;

/// Describe the render pass for a chain of `present_format` images
pub fn scene_render_pass(
    present_format: TextureFormat,
    color_format: TextureFormat,
    depth_format: TextureFormat,
) -> RenderPassDesc {
    RenderPassDesc {
        attachments: vec![
            AttachmentDesc {
                format: present_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                final_usage: AttachmentUsage::Present,
            },
            AttachmentDesc {
                format: color_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::DontCare,
                final_usage: AttachmentUsage::ColorAttachment,
            },
            AttachmentDesc {
                format: depth_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::DontCare,
                final_usage: AttachmentUsage::DepthAttachment,
            },
        ],
        subpasses: vec![
            SubpassDesc {
                color_attachments: vec![COLOR_ATTACHMENT],
                depth_attachment: Some(DEPTH_ATTACHMENT),
                input_attachments: Vec::new(),
            },
            SubpassDesc {
                color_attachments: vec![PRESENT_ATTACHMENT],
                depth_attachment: None,
                input_attachments: vec![COLOR_ATTACHMENT, DEPTH_ATTACHMENT],
            },
        ],
    }
}

/// One clear value per attachment, in attachment order
pub fn clear_values(clear_color: [f32; 4]) -> [ClearValue; 3] {
    [
        ClearValue::Color(clear_color),
        ClearValue::Color(clear_color),
        ClearValue::DepthStencil { depth: CLEAR_DEPTH, stencil: 0 },
    ]
}

#[cfg(test)]
#[path = "render_graph_tests.rs"]
mod tests;
