/// Texture trait, texture formats and sampler presets

use std::any::Any;

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    /// 8-bit RGBA, sRGB-encoded
    R8G8B8A8_SRGB,
    /// 8-bit RGBA, linear
    R8G8B8A8_UNORM,
    /// 8-bit BGRA, sRGB-encoded (typical presentable format)
    B8G8R8A8_SRGB,
    /// 8-bit BGRA, linear
    B8G8R8A8_UNORM,
    /// 32-bit float depth
    D32_FLOAT,
    /// 32-bit float depth + 8-bit stencil
    D32_FLOAT_S8_UINT,
    /// 24-bit depth + 8-bit stencil
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Bytes per texel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::D32_FLOAT
            | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::D32_FLOAT_S8_UINT => 8,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D32_FLOAT | TextureFormat::D32_FLOAT_S8_UINT | TextureFormat::D24_UNORM_S8_UINT
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT_S8_UINT | TextureFormat::D24_UNORM_S8_UINT)
    }
}

/// How a texture is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    /// Sampled in shaders, filled by a buffer-to-image copy
    Sampled,
    /// Color render target that a later subpass reads as an input attachment
    ColorAttachment,
    /// Depth render target that a later subpass reads as an input attachment
    DepthAttachment,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// Texture properties (immutable after creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureInfo {
    /// Size in bytes of the full image
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Image layout, as seen by layout transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Undefined,
    TransferDst,
    ShaderReadOnly,
}

/// Sampler presets
///
/// Backends create one sampler per preset and share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    LinearRepeat,
    LinearClamp,
    NearestRepeat,
    NearestClamp,
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g., VulkanTexture).
/// Swapchain image views are textures too; those do not own their image.
pub trait Texture: Send + Sync {
    fn info(&self) -> TextureInfo;

    fn as_any(&self) -> &dyn Any;
}
