/// Buffer trait and buffer descriptor

use std::any::Any;
use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer (also a transfer destination)
    Vertex,
    /// Index buffer of `u32` indices (also a transfer destination)
    Index,
    /// Uniform buffer
    Uniform,
    /// Transfer source for staged uploads
    Staging,
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local, not CPU-visible; filled through a staging copy
    GpuOnly,
    /// Host-visible and coherent, persistently mapped
    CpuToGpu,
    /// Host-visible, for readback
    GpuToCpu,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory placement
    pub location: MemoryLocation,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer and its memory are released when dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;

    fn location(&self) -> MemoryLocation;

    /// Write `data` at `offset`
    ///
    /// Fails with `InvalidResource` when the range exceeds the buffer or the
    /// memory is not host-visible.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read `len` bytes starting at `offset` from host-visible memory
    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;
}

/// Check that `[offset, offset + len)` fits in a buffer of `size` bytes
pub fn check_range(size: u64, offset: u64, len: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::error::Error::InvalidResource(format!(
            "buffer range {}..{} exceeds size {}",
            offset,
            offset.saturating_add(len),
            size
        ))),
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
