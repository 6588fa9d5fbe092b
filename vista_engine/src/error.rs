//! Error types for the Vista engine
//!
//! Every GPU-call boundary returns [`Result`]. The variants split into three
//! families:
//!
//! - **fatal**: device, memory, shader, pipeline and surface failures that abort
//!   initialization or the frame loop
//! - **recoverable**: [`Error::SurfaceStale`], handled by rebuilding the
//!   presentable chain and never surfaced past the frame loop
//! - **invariant violations**: [`Error::InvalidResource`] and
//!   [`Error::PoolExhausted`], which indicate incorrect usage or exceeded
//!   capacity planning

use std::fmt;
use crate::config::ConfigError;

/// Result type for Vista engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why the presentable chain no longer matches its surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The surface changed and the chain can no longer present
    OutOfDate,
    /// Presentation still works but the chain no longer matches the surface
    Suboptimal,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::OutOfDate => write!(f, "out of date"),
            StaleReason::Suboptimal => write!(f, "suboptimal"),
        }
    }
}

/// Vista engine errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No adapter offers the queues, extensions and surface support we need
    #[error("No suitable GPU: {0}")]
    NoSuitableDevice(String),

    /// No memory type matches both the type mask and the required properties
    #[error("No suitable memory type: {0}")]
    NoSuitableMemory(String),

    /// Logical device creation failed
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// The windowing surface lacks a required extension or capability
    #[error("Surface unsupported: {0}")]
    SurfaceUnsupported(String),

    /// Shader binary could not be read or turned into a module
    #[error("Shader load failed: {0}")]
    ShaderLoad(String),

    /// Graphics pipeline or pipeline layout creation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// The presentable chain must be rebuilt before drawing again
    #[error("Presentable chain is stale ({0})")]
    SurfaceStale(StaleReason),

    /// A descriptor pool has no free set left
    #[error("Descriptor pool exhausted (capacity: {capacity} sets)")]
    PoolExhausted {
        /// Number of sets the pool was sized for
        capacity: u32,
    },

    /// Out of GPU memory
    #[error("Out of GPU memory")]
    OutOfMemory,

    /// Invalid resource or invalid use of one (out-of-range index, unresolved slot, ...)
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Model or image import failed
    #[error("Asset import failed: {0}")]
    AssetImport(String),

    /// Configuration could not be loaded or is inconsistent
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Initialization failed (instance, surface, subsystems)
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Backend-specific error (Vulkan)
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl Error {
    /// True for the recoverable "rebuild the chain" condition.
    pub fn is_surface_stale(&self) -> bool {
        matches!(self, Error::SurfaceStale(_))
    }

    /// True for every error that must abort the current operation.
    pub fn is_fatal(&self) -> bool {
        !self.is_surface_stale()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
