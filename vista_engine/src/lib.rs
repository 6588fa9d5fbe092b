/*!
# Vista Engine

Core traits and types for the Vista real-time rendering engine.

This crate provides the platform-agnostic half of the engine: the GPU
abstraction traits a backend implements, the resources built on them, and
the frame orchestrator that drives acquire, record, submit and present.
Backend implementations (Vulkan) live in their own crates and are handed to
the orchestrator as trait objects.

## Architecture

- **GraphicsDevice**: Factory trait for buffers, textures, pipelines, descriptor pools and command lists
- **Swapchain**: The chain of presentable images, recreated wholesale on resize
- **TextureCache**: Deduplicating texture store with one descriptor set per texture
- **Mesh / MeshModel**: Device-local geometry uploaded through staging buffers
- **Renderer**: Frame orchestrator owning frame slots, the render graph and chain-dependent objects
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod resource;
pub mod camera;
pub mod renderer;

// Main vista namespace module
pub mod vista {
    // Error types
    pub use crate::error::{Error, Result, StaleReason};

    // Logging registry
    pub use crate::engine::Engine;

    // Device abstraction and orchestrator
    pub use crate::graphics_device::GraphicsDevice;
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Configuration sub-module
    pub mod config {
        pub use crate::config::*;
    }

    // GPU abstraction sub-module
    pub mod render {
        pub use crate::graphics_device::*;
        pub use crate::renderer::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Camera sub-module
    pub mod camera {
        pub use crate::camera::*;
    }
}

// Re-export math library at crate root
pub use glam;
