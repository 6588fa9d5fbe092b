/// Binding layouts, descriptor pools and binding groups
///
/// Every descriptor set the renderer uses follows one of three fixed layouts.
/// A pool is created for one layout with a fixed capacity; allocating past it
/// fails with `PoolExhausted` and leaves the sets already handed out intact.

use std::any::Any;
use std::sync::Arc;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferUsage, SamplerType, Texture};

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

/// Kind of resource bound at one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    UniformBuffer,
    CombinedImageSampler,
    InputAttachment,
}

/// One binding of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEntry {
    pub binding: u32,
    pub binding_type: BindingType,
    pub stages: ShaderStageFlags,
}

/// The descriptor set layouts used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingLayout {
    /// binding 0: uniform buffer {projection, view}, vertex stage
    Camera,
    /// binding 0: combined image sampler, fragment stage
    Texture,
    /// bindings 0 and 1: color and depth input attachments, fragment stage
    InputAttachments,
}

impl BindingLayout {
    pub fn entries(&self) -> &'static [BindingEntry] {
        const CAMERA: [BindingEntry; 1] = [BindingEntry {
            binding: 0,
            binding_type: BindingType::UniformBuffer,
            stages: ShaderStageFlags::VERTEX,
        }];
        const TEXTURE: [BindingEntry; 1] = [BindingEntry {
            binding: 0,
            binding_type: BindingType::CombinedImageSampler,
            stages: ShaderStageFlags::FRAGMENT,
        }];
        const INPUTS: [BindingEntry; 2] = [
            BindingEntry {
                binding: 0,
                binding_type: BindingType::InputAttachment,
                stages: ShaderStageFlags::FRAGMENT,
            },
            BindingEntry {
                binding: 1,
                binding_type: BindingType::InputAttachment,
                stages: ShaderStageFlags::FRAGMENT,
            },
        ];

        match self {
            BindingLayout::Camera => &CAMERA,
            BindingLayout::Texture => &TEXTURE,
            BindingLayout::InputAttachments => &INPUTS,
        }
    }
}

/// A resource written into one binding, in binding order
#[derive(Clone, Copy)]
pub enum BindingResource<'a> {
    UniformBuffer(&'a dyn Buffer),
    SampledTexture(&'a dyn Texture, SamplerType),
    InputAttachment(&'a dyn Texture),
}

impl BindingResource<'_> {
    pub fn binding_type(&self) -> BindingType {
        match self {
            BindingResource::UniformBuffer(_) => BindingType::UniformBuffer,
            BindingResource::SampledTexture(..) => BindingType::CombinedImageSampler,
            BindingResource::InputAttachment(_) => BindingType::InputAttachment,
        }
    }
}

/// Check that `resources` fill `layout` binding for binding
pub fn validate_resources(layout: BindingLayout, resources: &[BindingResource]) -> Result<()> {
    let entries = layout.entries();
    if entries.len() != resources.len() {
        return Err(Error::InvalidResource(format!(
            "{:?} layout has {} binding(s), got {} resource(s)",
            layout,
            entries.len(),
            resources.len()
        )));
    }
    for (entry, resource) in entries.iter().zip(resources) {
        if entry.binding_type != resource.binding_type() {
            return Err(Error::InvalidResource(format!(
                "{:?} binding {} expects {:?}, got {:?}",
                layout,
                entry.binding,
                entry.binding_type,
                resource.binding_type()
            )));
        }
        if let BindingResource::UniformBuffer(buffer) = resource {
            if buffer.usage() != BufferUsage::Uniform {
                return Err(Error::InvalidResource(format!(
                    "{:?} binding {} needs a uniform buffer, got {:?}",
                    layout,
                    entry.binding,
                    buffer.usage()
                )));
            }
        }
    }
    Ok(())
}

/// Descriptor for creating a descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub layout: BindingLayout,
    /// Number of sets the pool can hand out
    pub max_sets: u32,
}

/// Fixed-capacity, append-only set allocator for one layout
///
/// Sets are never freed individually; they all go away with the pool.
pub trait DescriptorPool: Send + Sync {
    fn layout(&self) -> BindingLayout;

    fn capacity(&self) -> u32;

    /// Number of sets allocated so far
    fn allocated(&self) -> u32;

    /// Allocate one set and write `resources` into it
    ///
    /// Fails with `PoolExhausted` once `capacity` sets exist, or
    /// `InvalidResource` when the resources do not match the layout.
    fn allocate(&self, resources: &[BindingResource]) -> Result<Arc<dyn BindingGroup>>;

    fn as_any(&self) -> &dyn Any;
}

/// An allocated descriptor set
pub trait BindingGroup: Send + Sync {
    fn layout(&self) -> BindingLayout;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "binding_group_tests.rs"]
mod tests;
