/// VulkanPipeline - graphics pipeline, its layout and its set layouts
///
/// Viewport and scissor are baked in; the orchestrator rebuilds pipelines
/// together with the presentable chain.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use vista_engine::vista::render::{BindingLayout, Extent2D, Pipeline, PipelineDesc, Shader};
use vista_engine::vista::Result;
use vista_engine::{engine_debug, engine_err};

use crate::downcast;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_pool::create_set_layout;
use crate::vulkan_format::{cull_mode_to_vk, front_face_to_vk, vertex_format_to_vk};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::{check_pipeline_interface, VulkanShader};

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    viewport: Extent2D,
    subpass: u32,
    binding_layouts: Vec<BindingLayout>,
    push_constant_size: u32,
}

impl VulkanPipeline {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        let vertex_shader: &VulkanShader = downcast(desc.vertex_shader.as_any(), "vertex shader")?;
        let fragment_shader: &VulkanShader = downcast(desc.fragment_shader.as_any(), "fragment shader")?;
        let render_pass: &VulkanRenderPass = downcast(desc.render_pass.as_any(), "render pass")?;

        check_pipeline_interface(
            &[
                (vertex_shader.stage(), &vertex_shader.reflection),
                (fragment_shader.stage(), &fragment_shader.reflection),
            ],
            &desc.binding_layouts,
            desc.push_constant_size,
        )?;

        // Set layouts first; the struct owns them from here so errors below clean up
        let mut pipeline = Self {
            ctx: Arc::clone(&ctx),
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_set_layouts: Vec::with_capacity(desc.binding_layouts.len()),
            viewport: desc.viewport,
            subpass: desc.subpass,
            binding_layouts: desc.binding_layouts.clone(),
            push_constant_size: desc.push_constant_size,
        };
        for layout in &desc.binding_layouts {
            let set_layout = create_set_layout(&ctx.device, *layout)?;
            pipeline.descriptor_set_layouts.push(set_layout);
        }

        let push_constant_ranges = if desc.push_constant_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: desc.push_constant_size,
            }]
        } else {
            Vec::new()
        };

        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&pipeline.descriptor_set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        pipeline.pipeline_layout = unsafe {
            ctx.device
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!("vista::vulkan", PipelineCreation, "Failed to create pipeline layout: {:?}", e))?
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vertex_shader.stage_flags())
                .module(vertex_shader.module)
                .name(&vertex_shader.entry_point_c),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(fragment_shader.stage_flags())
                .module(fragment_shader.module)
                .name(&fragment_shader.entry_point_c),
        ];

        // Vertex input state (empty for generated fullscreen geometry)
        let (vertex_bindings, vertex_attributes) = match &desc.vertex_layout {
            Some(layout) => (
                vec![vk::VertexInputBindingDescription {
                    binding: 0,
                    stride: layout.stride,
                    input_rate: vk::VertexInputRate::VERTEX,
                }],
                layout
                    .attributes
                    .iter()
                    .map(|attribute| vk::VertexInputAttributeDescription {
                        location: attribute.location,
                        binding: 0,
                        format: vertex_format_to_vk(attribute.format),
                        offset: attribute.offset,
                    })
                    .collect::<Vec<_>>(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Static viewport and scissor covering the chain extent
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.viewport.width as f32,
            height: desc.viewport.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: desc.viewport.width,
                height: desc.viewport.height,
            },
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(front_face_to_vk(desc.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Both subpasses write exactly one color attachment
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(pipeline.pipeline_layout)
            .render_pass(render_pass.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|(_, e)| {
                    engine_err!("vista::vulkan", PipelineCreation, "Failed to create graphics pipeline: {:?}", e)
                })?
        };
        pipeline.pipeline = pipelines.first().copied().unwrap_or_default();

        engine_debug!(
            "vista::vulkan",
            "Pipeline created: subpass {}, {} set(s), {} push bytes, {}x{}",
            desc.subpass,
            desc.binding_layouts.len(),
            desc.push_constant_size,
            desc.viewport.width,
            desc.viewport.height
        );

        Ok(pipeline)
    }
}

impl Pipeline for VulkanPipeline {
    fn viewport(&self) -> Extent2D {
        self.viewport
    }

    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn binding_layouts(&self) -> &[BindingLayout] {
        &self.binding_layouts
    }

    fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.ctx.device.destroy_pipeline(self.pipeline, None);
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            for &layout in &self.descriptor_set_layouts {
                self.ctx.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}
