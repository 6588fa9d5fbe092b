/// Swapchain trait - the chain of presentable images tied to a window surface
///
/// The selection helpers at the top are pure functions over what the surface
/// reports, shared by every backend.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{FrameSync, Texture, TextureFormat};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    Immediate,
    /// Triple-buffered, low latency
    Mailbox,
    /// V-sync queue; always supported
    Fifo,
    FifoRelaxed,
}

/// Color space of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other,
}

/// One surface format; `format` is `None` for formats the engine has no name for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: Option<TextureFormat>,
    pub color_space: ColorSpace,
}

/// Surface limits relevant to chain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// Fixed extent imposed by the surface, `None` when the swapchain decides
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
}

/// Extent to create the chain with
///
/// A surface-imposed extent wins; otherwise `requested` is clamped into the
/// reported bounds.
pub fn choose_extent(caps: &SurfaceCapabilities, requested: Extent2D) -> Extent2D {
    if let Some(current) = caps.current_extent {
        return current;
    }
    Extent2D {
        width: requested.width.clamp(caps.min_extent.width, caps.max_extent.width.max(caps.min_extent.width)),
        height: requested
            .height
            .clamp(caps.min_extent.height, caps.max_extent.height.max(caps.min_extent.height)),
    }
}

/// One more than the minimum, capped at the maximum when there is one
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// Mailbox when available, FIFO otherwise
pub fn choose_present_mode(available: &[PresentMode]) -> PresentMode {
    if available.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

/// Index of the preferred surface format
///
/// B8G8R8A8_SRGB with an sRGB non-linear color space when offered, else the
/// first format the engine can name. `None` when no format is usable.
pub fn choose_surface_format(available: &[SurfaceFormat]) -> Option<usize> {
    available
        .iter()
        .position(|f| {
            f.format == Some(TextureFormat::B8G8R8A8_SRGB) && f.color_space == ColorSpace::SrgbNonlinear
        })
        .or_else(|| available.iter().position(|f| f.format.is_some()))
}

/// Swapchain for presenting rendered images to a window
///
/// Staleness is reported as `Error::SurfaceStale`; the caller rebuilds
/// everything that depends on the chain and calls [`Swapchain::recreate`].
pub trait Swapchain: Send {
    /// Acquire the next image index, signaling `sync`'s image-acquired semaphore
    ///
    /// Waits without timeout. An out-of-date chain yields
    /// `SurfaceStale(OutOfDate)`; a suboptimal acquire still returns the index.
    fn acquire_next_image(&mut self, sync: &dyn FrameSync) -> Result<u32>;

    /// Present `image_index` once `sync`'s rendering-finished semaphore fires
    ///
    /// Out-of-date and suboptimal results yield `SurfaceStale`.
    fn present(&mut self, image_index: u32, sync: &dyn FrameSync) -> Result<()>;

    /// Replace the chain with one created against `extent`
    ///
    /// The device must be idle and every object built on the old image views
    /// already dropped.
    fn recreate(&mut self, extent: Extent2D) -> Result<()>;

    fn image_count(&self) -> u32;

    fn extent(&self) -> Extent2D;

    fn format(&self) -> TextureFormat;

    /// View of image `index`; `InvalidResource` when out of range
    fn image_view(&self, index: u32) -> Result<Arc<dyn Texture>>;
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
