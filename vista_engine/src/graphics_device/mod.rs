/// Graphics device module - GPU abstraction traits and the pure selection logic
/// shared by every backend

// Module declarations
pub mod graphics_device;
pub mod adapter;
pub mod buffer;
pub mod texture;
pub mod shader;
pub mod pipeline;
pub mod render_pass;
pub mod frame_buffer;
pub mod binding_group;
pub mod command_list;
pub mod sync;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use adapter::*;
pub use buffer::*;
pub use texture::*;
pub use shader::*;
pub use pipeline::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use binding_group::*;
pub use command_list::*;
pub use sync::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
