/// VulkanRenderPass - Vulkan implementation of the RenderPass trait
///
/// Subpass dependencies are derived from subpass order: external to the
/// first subpass, each subpass to the next (by region, the next one reading
/// the previous output as input attachments), and the last one to external.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{RenderPass, RenderPassDesc, TextureFormat};
use vista_engine::vista::Result;
use vista_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{final_layout, load_op_to_vk, store_op_to_vk, texture_format_to_vk};

pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    subpass_count: u32,
    attachment_count: u32,
}

/// Per-subpass attachment references, kept alive while the create info borrows them
struct SubpassRefs {
    color: Vec<vk::AttachmentReference>,
    depth: Option<vk::AttachmentReference>,
    input: Vec<vk::AttachmentReference>,
}

impl VulkanRenderPass {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        desc.validate()?;

        let attachments = attachment_descriptions(desc);
        let refs: Vec<SubpassRefs> = desc
            .subpasses
            .iter()
            .map(|subpass| SubpassRefs {
                color: subpass
                    .color_attachments
                    .iter()
                    .map(|&index| reference(index, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                    .collect(),
                depth: subpass
                    .depth_attachment
                    .map(|index| reference(index, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)),
                input: subpass
                    .input_attachments
                    .iter()
                    .map(|&index| reference(index, input_layout(desc.attachments[index as usize].format)))
                    .collect(),
            })
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = refs
            .iter()
            .map(|r| {
                let mut subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(&r.color)
                    .input_attachments(&r.input);
                if let Some(depth) = r.depth.as_ref() {
                    subpass = subpass.depth_stencil_attachment(depth);
                }
                subpass
            })
            .collect();

        let dependencies = subpass_dependencies(desc.subpasses.len() as u32);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&render_pass_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create render pass: {:?}", e))?
        };

        Ok(Self {
            ctx,
            render_pass,
            subpass_count: desc.subpasses.len() as u32,
            attachment_count: desc.attachments.len() as u32,
        })
    }
}

fn reference(attachment: u32, layout: vk::ImageLayout) -> vk::AttachmentReference {
    vk::AttachmentReference { attachment, layout }
}

/// Layout an attachment is read in by a later subpass
pub(crate) fn input_layout(format: TextureFormat) -> vk::ImageLayout {
    if format.is_depth() {
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    }
}

pub(crate) fn attachment_descriptions(desc: &RenderPassDesc) -> Vec<vk::AttachmentDescription> {
    desc.attachments
        .iter()
        .map(|attachment| {
            vk::AttachmentDescription::default()
                .format(texture_format_to_vk(attachment.format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op_to_vk(attachment.load_op))
                .store_op(store_op_to_vk(attachment.store_op))
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(final_layout(attachment.final_usage))
        })
        .collect()
}

/// Dependencies for `subpass_count` subpasses executed in order
pub(crate) fn subpass_dependencies(subpass_count: u32) -> Vec<vk::SubpassDependency> {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let attachment_writes =
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

    let mut dependencies = Vec::with_capacity(subpass_count as usize + 1);

    if subpass_count == 0 {
        return dependencies;
    }

    // Previous use of the attachments (last frame) before the first subpass writes them
    dependencies.push(
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(attachment_stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(attachment_stages)
            .dst_access_mask(attachment_writes),
    );

    for subpass in 1..subpass_count {
        dependencies.push(
            vk::SubpassDependency::default()
                .src_subpass(subpass - 1)
                .dst_subpass(subpass)
                .src_stage_mask(attachment_stages)
                .src_access_mask(attachment_writes)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::INPUT_ATTACHMENT_READ)
                .dependency_flags(vk::DependencyFlags::BY_REGION),
        );
    }

    dependencies.push(
        vk::SubpassDependency::default()
            .src_subpass(subpass_count - 1)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ)
            .dependency_flags(vk::DependencyFlags::BY_REGION),
    );

    dependencies
}

impl RenderPass for VulkanRenderPass {
    fn subpass_count(&self) -> u32 {
        self.subpass_count
    }

    fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;
