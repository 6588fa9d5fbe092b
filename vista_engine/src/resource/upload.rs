/// Staging uploads
///
/// Data reaches device-local memory through a host-visible staging buffer and
/// a synchronous copy. The staging buffer is released as soon as the copy has
/// completed.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, GraphicsDevice, ImageLayout, MemoryLocation, Texture, TextureDesc,
    TextureFormat, TextureUsage,
};
use crate::resource::DecodedImage;

/// Create a host-visible staging buffer holding `data`
pub fn create_staging_buffer(device: &dyn GraphicsDevice, data: &[u8]) -> Result<Arc<dyn Buffer>> {
    if data.is_empty() {
        return Err(Error::InvalidResource("nothing to upload".to_string()));
    }
    let staging = device.create_buffer(BufferDesc {
        size: data.len() as u64,
        usage: BufferUsage::Staging,
        location: MemoryLocation::CpuToGpu,
    })?;
    staging.update(0, data)?;
    Ok(staging)
}

/// Copy `data` into the start of `dst` through a staging buffer
pub fn upload_to_buffer(device: &dyn GraphicsDevice, dst: &dyn Buffer, data: &[u8]) -> Result<()> {
    if data.len() as u64 > dst.size() {
        return Err(Error::InvalidResource(format!(
            "upload of {} bytes into a {}-byte buffer",
            data.len(),
            dst.size()
        )));
    }
    let staging = create_staging_buffer(device, data)?;
    device.copy_buffer(staging.as_ref(), dst, data.len() as u64)
}

/// Create a buffer with `usage` in `location` and fill it with `data`
pub fn create_buffer_with_data(
    device: &dyn GraphicsDevice,
    usage: BufferUsage,
    location: MemoryLocation,
    data: &[u8],
) -> Result<Arc<dyn Buffer>> {
    let buffer = device.create_buffer(BufferDesc { size: data.len() as u64, usage, location })?;
    upload_to_buffer(device, buffer.as_ref(), data)?;
    Ok(buffer)
}

/// Create a sampled texture from decoded RGBA pixels
///
/// The image goes Undefined -> TransferDst, receives the staged texels, then
/// goes TransferDst -> ShaderReadOnly, all in one synchronous submission.
/// Sampling is only valid after the second transition.
pub fn upload_texture(device: &dyn GraphicsDevice, image: &DecodedImage) -> Result<Arc<dyn Texture>> {
    image.validate()?;
    let staging = create_staging_buffer(device, &image.rgba)?;
    let texture = device.create_texture(TextureDesc {
        width: image.width,
        height: image.height,
        format: TextureFormat::R8G8B8A8_SRGB,
        usage: TextureUsage::Sampled,
    })?;

    let mut cmd = device.begin_one_shot()?;
    cmd.transition_texture(texture.as_ref(), ImageLayout::Undefined, ImageLayout::TransferDst)?;
    cmd.copy_buffer_to_texture(staging.as_ref(), texture.as_ref())?;
    cmd.transition_texture(texture.as_ref(), ImageLayout::TransferDst, ImageLayout::ShaderReadOnly)?;
    device.submit_one_shot(cmd)?;

    Ok(texture)
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
