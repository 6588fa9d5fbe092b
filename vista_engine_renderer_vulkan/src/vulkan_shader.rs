/// VulkanShader - shader module plus what SPIR-V reflection says it expects
///
/// Pipelines compare the reflected interface of their two stages against the
/// declared binding layouts and push constant size before calling the driver.

use ash::vk;
use std::any::Any;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;
use vista_engine::vista::render::{BindingLayout, BindingType, Shader, ShaderDesc, ShaderStage};
use vista_engine::vista::Result;
use vista_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

/// One descriptor the shader declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    /// `None` for descriptor kinds no engine layout uses (storage images, ...)
    pub binding_type: Option<BindingType>,
}

/// Resource interface of one shader stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    /// Byte size of the push constant block, if the stage declares one
    pub push_constant_size: Option<u32>,
}

pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
    pub(crate) entry_point_c: CString,
    pub(crate) reflection: ShaderReflection,
}

impl VulkanShader {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: ShaderDesc) -> Result<Self> {
        // read_spv checks the magic number and copies into aligned words
        let code = ash::util::read_spv(&mut Cursor::new(desc.code))
            .map_err(|e| engine_err!("vista::vulkan", ShaderLoad, "Invalid SPIR-V binary ({} bytes): {}", desc.code.len(), e))?;

        let entry_point_c = CString::new(desc.entry_point)
            .map_err(|_| engine_err!("vista::vulkan", ShaderLoad, "Entry point '{}' contains a NUL byte", desc.entry_point))?;

        let reflection = reflect(&code)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("vista::vulkan", ShaderLoad, "Failed to create shader module: {:?}", e))?
        };

        Ok(Self {
            ctx,
            module,
            stage: desc.stage,
            entry_point: desc.entry_point.to_string(),
            entry_point_c,
            reflection,
        })
    }

    pub(crate) fn stage_flags(&self) -> vk::ShaderStageFlags {
        shader_stage_to_vk(self.stage)
    }
}

impl Shader for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Extract descriptor bindings and the push constant block using spirq
fn reflect(code: &[u32]) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("vista::vulkan", ShaderLoad, "SPIR-V reflection failed: {:?}", e))?;

    let mut reflection = ShaderReflection::default();

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } => {
                    let binding = ReflectedBinding {
                        name: name.clone().unwrap_or_default(),
                        set: desc_bind.set(),
                        binding: desc_bind.bind(),
                        binding_type: binding_type_of(desc_ty),
                    };
                    if !reflection.bindings.contains(&binding) {
                        reflection.bindings.push(binding);
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    let size = ty.nbyte().map(|s| s as u32).unwrap_or(0);
                    reflection.push_constant_size = Some(reflection.push_constant_size.unwrap_or(0).max(size));
                }
                _ => {}
            }
        }
    }

    Ok(reflection)
}

fn binding_type_of(desc_ty: &spirq::ty::DescriptorType) -> Option<BindingType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::UniformBuffer() => Some(BindingType::UniformBuffer),
        DescriptorType::CombinedImageSampler() => Some(BindingType::CombinedImageSampler),
        DescriptorType::InputAttachment(..) => Some(BindingType::InputAttachment),
        _ => None,
    }
}

/// Check the reflected interface of every stage against the pipeline declaration
///
/// Each reflected binding must exist in the declared layout of its set with
/// the same descriptor type, stages sharing a binding must agree on its type,
/// and no stage may push more bytes than `push_constant_size`.
pub(crate) fn check_pipeline_interface(
    stages: &[(ShaderStage, &ShaderReflection)],
    layouts: &[BindingLayout],
    push_constant_size: u32,
) -> Result<()> {
    for (stage, reflection) in stages {
        for binding in &reflection.bindings {
            let Some(layout) = layouts.get(binding.set as usize) else {
                engine_bail!("vista::vulkan", PipelineCreation,
                    "{:?} shader uses '{}' at set {} but the pipeline declares {} set(s)",
                    stage, binding.name, binding.set, layouts.len());
            };

            let Some(entry) = layout.entries().iter().find(|e| e.binding == binding.binding) else {
                engine_bail!("vista::vulkan", PipelineCreation,
                    "{:?} shader uses '{}' at set {} binding {}, absent from the {:?} layout",
                    stage, binding.name, binding.set, binding.binding, layout);
            };

            if binding.binding_type != Some(entry.binding_type) {
                engine_bail!("vista::vulkan", PipelineCreation,
                    "{:?} shader declares '{}' (set {}, binding {}) as {:?}, the {:?} layout expects {:?}",
                    stage, binding.name, binding.set, binding.binding,
                    binding.binding_type, layout, entry.binding_type);
            }
        }

        if let Some(size) = reflection.push_constant_size {
            if size > push_constant_size {
                engine_bail!("vista::vulkan", PipelineCreation,
                    "{:?} shader pushes {} bytes, the pipeline declares {}",
                    stage, size, push_constant_size);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
