/// Conversions between engine descriptors and Vulkan enums
///
/// Pure functions only, so they are unit-tested without a GPU.

use ash::vk;
use vista_engine::vista::render::{
    AdapterType, AttachmentUsage, BindingType, ColorSpace, CullMode, Extent2D, FrontFace, ImageLayout,
    LoadOp, MemoryLocation, MemoryPropertyFlags, PresentMode, ShaderStage, ShaderStageFlags, StoreOp,
    SurfaceCapabilities, SurfaceFormat, TextureFormat, VertexFormat,
};

pub(crate) fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

/// `None` for formats the engine has no name for
pub(crate) fn texture_format_from_vk(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::R8G8B8A8_SRGB => Some(TextureFormat::R8G8B8A8_SRGB),
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::R8G8B8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(TextureFormat::B8G8R8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::B8G8R8A8_UNORM),
        vk::Format::D32_SFLOAT => Some(TextureFormat::D32_FLOAT),
        vk::Format::D32_SFLOAT_S8_UINT => Some(TextureFormat::D32_FLOAT_S8_UINT),
        vk::Format::D24_UNORM_S8_UINT => Some(TextureFormat::D24_UNORM_S8_UINT),
        _ => None,
    }
}

pub(crate) fn surface_format_from_vk(format: &vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: texture_format_from_vk(format.format),
        color_space: if format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR {
            ColorSpace::SrgbNonlinear
        } else {
            ColorSpace::Other
        },
    }
}

/// `None` for present modes the engine never picks
pub(crate) fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub(crate) fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// A `current_extent` of `u32::MAX` means the swapchain picks the size
pub(crate) fn surface_capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    let current_extent = if caps.current_extent.width == u32::MAX {
        None
    } else {
        Some(extent_from_vk(caps.current_extent))
    };

    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_extent: extent_from_vk(caps.min_image_extent),
        max_extent: extent_from_vk(caps.max_image_extent),
    }
}

pub(crate) fn extent_from_vk(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

pub(crate) fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: extent.width,
        height: extent.height,
    }
}

pub(crate) fn memory_flags_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    let mut out = MemoryPropertyFlags::empty();
    if flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) { out |= MemoryPropertyFlags::DEVICE_LOCAL; }
    if flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) { out |= MemoryPropertyFlags::HOST_VISIBLE; }
    if flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) { out |= MemoryPropertyFlags::HOST_COHERENT; }
    if flags.contains(vk::MemoryPropertyFlags::HOST_CACHED) { out |= MemoryPropertyFlags::HOST_CACHED; }
    if flags.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED) { out |= MemoryPropertyFlags::LAZILY_ALLOCATED; }
    out
}

/// Properties a memory type must have to back an allocation at `location`
pub(crate) fn required_memory_flags(location: MemoryLocation) -> MemoryPropertyFlags {
    match location {
        MemoryLocation::GpuOnly => MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryLocation::CpuToGpu => MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        MemoryLocation::GpuToCpu => MemoryPropertyFlags::HOST_VISIBLE,
    }
}

pub(crate) fn memory_location_to_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub(crate) fn adapter_type_from_vk(device_type: vk::PhysicalDeviceType) -> AdapterType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterType::Cpu,
        _ => AdapterType::Other,
    }
}

pub(crate) fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
    }
}

pub(crate) fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

/// Layout an attachment is left in when the render pass ends
pub(crate) fn final_layout(usage: AttachmentUsage) -> vk::ImageLayout {
    match usage {
        AttachmentUsage::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        AttachmentUsage::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        AttachmentUsage::DepthAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    }
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

/// Every aspect of `format`, as attachments and barriers need
pub(crate) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        read_aspect_mask(format)
    }
}

/// The single aspect shaders read and copies write
pub(crate) fn read_aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub(crate) fn binding_type_to_vk(binding_type: BindingType) -> vk::DescriptorType {
    match binding_type {
        BindingType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        BindingType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub(crate) fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut vk_flags = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) { vk_flags |= vk::ShaderStageFlags::VERTEX; }
    if flags.contains(ShaderStageFlags::FRAGMENT) { vk_flags |= vk::ShaderStageFlags::FRAGMENT; }
    vk_flags
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
