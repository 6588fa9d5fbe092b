/// Samplers shared by texture descriptors, one per [`SamplerType`]

use ash::vk;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use vista_engine::vista::render::SamplerType;
use vista_engine::vista::Result;
use vista_engine::engine_err;

use crate::vulkan_context::GpuContext;

const MAX_ANISOTROPY: f32 = 16.0;

/// Filter and addressing of a sampler preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SamplerParams {
    pub filter: vk::Filter,
    pub address: vk::SamplerAddressMode,
}

pub(crate) fn sampler_params(sampler_type: SamplerType) -> SamplerParams {
    let (filter, address) = match sampler_type {
        SamplerType::LinearRepeat => (vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT),
        SamplerType::LinearClamp => (vk::Filter::LINEAR, vk::SamplerAddressMode::CLAMP_TO_EDGE),
        SamplerType::NearestRepeat => (vk::Filter::NEAREST, vk::SamplerAddressMode::REPEAT),
        SamplerType::NearestClamp => (vk::Filter::NEAREST, vk::SamplerAddressMode::CLAMP_TO_EDGE),
    };
    SamplerParams { filter, address }
}

/// Lazily created samplers, destroyed together with the cache
pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    samplers: FxHashMap<SamplerType, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx, samplers: FxHashMap::default() }
    }

    pub(crate) fn get(&mut self, sampler_type: SamplerType) -> Result<vk::Sampler> {
        match self.samplers.entry(sampler_type) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let sampler = create_sampler(&self.ctx, sampler_type)?;
                Ok(*entry.insert(sampler))
            }
        }
    }
}

fn create_sampler(ctx: &GpuContext, sampler_type: SamplerType) -> Result<vk::Sampler> {
    let params = sampler_params(sampler_type);
    // Nearest presets stay pixel-exact
    let anisotropy = ctx.anisotropy_enabled && params.filter == vk::Filter::LINEAR;

    // Textures carry a single mip level
    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(params.filter)
        .min_filter(params.filter)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(params.address)
        .address_mode_v(params.address)
        .address_mode_w(params.address)
        .max_lod(0.0)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(if anisotropy { MAX_ANISOTROPY } else { 1.0 })
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK);

    unsafe { ctx.device.create_sampler(&create_info, None) }
        .map_err(|e| engine_err!("vista::vulkan", "Failed to create {:?} sampler: {:?}", sampler_type, e))
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for sampler in self.samplers.values() {
            unsafe { self.ctx.device.destroy_sampler(*sampler, None) };
        }
    }
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
