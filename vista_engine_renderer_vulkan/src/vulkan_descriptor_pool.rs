/// VulkanDescriptorPool - fixed-capacity descriptor set allocator for one layout
///
/// The pool is sized for exactly `max_sets` sets of its layout. Binding
/// groups keep the pool alive; the sets are released together with it.

use ash::vk;
use std::any::Any;
use std::sync::{Arc, Mutex};
use vista_engine::vista::render::{
    validate_resources, BindingGroup, BindingLayout, BindingResource, DescriptorPool, DescriptorPoolDesc,
};
use vista_engine::vista::{Error, Result};
use vista_engine::{engine_debug, engine_err, engine_warn};

use crate::downcast;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{binding_type_to_vk, stage_flags_to_vk};
use crate::vulkan_render_pass::input_layout;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_texture::VulkanTexture;

/// Create the VkDescriptorSetLayout matching `layout`
pub(crate) fn create_set_layout(device: &ash::Device, layout: BindingLayout) -> Result<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = layout
        .entries()
        .iter()
        .map(|entry| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(entry.binding)
                .descriptor_type(binding_type_to_vk(entry.binding_type))
                .descriptor_count(1)
                .stage_flags(stage_flags_to_vk(entry.stages))
        })
        .collect();

    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

    unsafe {
        device
            .create_descriptor_set_layout(&create_info, None)
            .map_err(|e| engine_err!("vista::vulkan", "Failed to create {:?} set layout: {:?}", layout, e))
    }
}

/// Pool sizes covering `max_sets` sets of `layout`
pub(crate) fn pool_sizes(layout: BindingLayout, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for entry in layout.entries() {
        let ty = binding_type_to_vk(entry.binding_type);
        match sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += max_sets,
            None => sizes.push(vk::DescriptorPoolSize { ty, descriptor_count: max_sets }),
        }
    }
    sizes
}

/// Pool state shared with the binding groups allocated from it
struct PoolInner {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

pub struct VulkanDescriptorPool {
    inner: Arc<PoolInner>,
    samplers: Arc<Mutex<SamplerCache>>,
    layout: BindingLayout,
    capacity: u32,
    /// Guards the VkDescriptorPool during allocation, counts sets handed out
    allocated: Mutex<u32>,
}

impl VulkanDescriptorPool {
    pub(crate) fn create(
        ctx: Arc<GpuContext>,
        samplers: Arc<Mutex<SamplerCache>>,
        desc: DescriptorPoolDesc,
    ) -> Result<Self> {
        if desc.max_sets == 0 {
            return Err(Error::InvalidResource(format!(
                "{:?} descriptor pool needs a capacity of at least one set",
                desc.layout
            )));
        }

        let set_layout = create_set_layout(&ctx.device, desc.layout)?;

        let sizes = pool_sizes(desc.layout, desc.max_sets);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(desc.max_sets)
            .pool_sizes(&sizes);

        let pool = match unsafe { ctx.device.create_descriptor_pool(&create_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(engine_err!("vista::vulkan", "Failed to create {:?} descriptor pool: {:?}", desc.layout, e));
            }
        };

        engine_debug!("vista::vulkan", "{:?} descriptor pool created ({} sets)", desc.layout, desc.max_sets);

        Ok(Self {
            inner: Arc::new(PoolInner { ctx, pool, set_layout }),
            samplers,
            layout: desc.layout,
            capacity: desc.max_sets,
            allocated: Mutex::new(0),
        })
    }

    fn write_set(&self, set: vk::DescriptorSet, resources: &[BindingResource]) -> Result<()> {
        let ctx = &self.inner.ctx;

        // Infos first; the writes borrow them
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for resource in resources {
            match resource {
                BindingResource::UniformBuffer(buffer) => {
                    let buffer: &VulkanBuffer = downcast(buffer.as_any(), "uniform buffer")?;
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(buffer.buffer)
                            .offset(0)
                            .range(vk::WHOLE_SIZE),
                    );
                }
                BindingResource::SampledTexture(texture, sampler_type) => {
                    let vk_texture: &VulkanTexture = downcast(texture.as_any(), "sampled texture")?;
                    let sampler = self
                        .samplers
                        .lock()
                        .map_err(|_| engine_err!("vista::vulkan", "Sampler cache mutex poisoned"))?
                        .get(*sampler_type)?;
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .sampler(sampler)
                            .image_view(vk_texture.read_view())
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    );
                }
                BindingResource::InputAttachment(texture) => {
                    let vk_texture: &VulkanTexture = downcast(texture.as_any(), "input attachment")?;
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_view(vk_texture.read_view())
                            .image_layout(input_layout(texture.info().format)),
                    );
                }
            }
        }

        let mut writes = Vec::with_capacity(resources.len());
        let (mut next_buffer, mut next_image) = (0, 0);
        for (entry, resource) in self.layout.entries().iter().zip(resources) {
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(entry.binding)
                .dst_array_element(0)
                .descriptor_type(binding_type_to_vk(entry.binding_type));
            let write = match resource {
                BindingResource::UniformBuffer(_) => {
                    next_buffer += 1;
                    write.buffer_info(&buffer_infos[next_buffer - 1..next_buffer])
                }
                _ => {
                    next_image += 1;
                    write.image_info(&image_infos[next_image - 1..next_image])
                }
            };
            writes.push(write);
        }

        unsafe {
            ctx.device.update_descriptor_sets(&writes, &[]);
        }
        Ok(())
    }
}

impl DescriptorPool for VulkanDescriptorPool {
    fn layout(&self) -> BindingLayout {
        self.layout
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn allocated(&self) -> u32 {
        self.allocated.lock().map(|count| *count).unwrap_or(self.capacity)
    }

    fn allocate(&self, resources: &[BindingResource]) -> Result<Arc<dyn BindingGroup>> {
        validate_resources(self.layout, resources)?;

        let mut allocated = self
            .allocated
            .lock()
            .map_err(|_| engine_err!("vista::vulkan", "Descriptor pool mutex poisoned"))?;

        if *allocated >= self.capacity {
            engine_warn!("vista::vulkan", "{:?} descriptor pool exhausted ({} sets)", self.layout, self.capacity);
            return Err(Error::PoolExhausted { capacity: self.capacity });
        }

        let set_layouts = [self.inner.set_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.inner.pool)
            .set_layouts(&set_layouts);

        let set = unsafe {
            self.inner
                .ctx
                .device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                        Error::PoolExhausted { capacity: self.capacity }
                    }
                    other => engine_err!("vista::vulkan", "Failed to allocate descriptor set: {:?}", other),
                })?
        }[0];

        self.write_set(set, resources)?;
        *allocated += 1;

        Ok(Arc::new(VulkanBindingGroup {
            _pool: Arc::clone(&self.inner),
            descriptor_set: set,
            layout: self.layout,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Descriptor set allocated from a [`VulkanDescriptorPool`]
///
/// Immutable after creation; freed with its pool.
pub struct VulkanBindingGroup {
    _pool: Arc<PoolInner>,
    pub(crate) descriptor_set: vk::DescriptorSet,
    layout: BindingLayout,
}

impl BindingGroup for VulkanBindingGroup {
    fn layout(&self) -> BindingLayout {
        self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_pool_tests.rs"]
mod tests;
