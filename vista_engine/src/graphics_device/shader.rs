/// Shader trait and shader descriptor

use std::any::Any;

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Descriptor for creating a shader module
#[derive(Debug, Clone, Copy)]
pub struct ShaderDesc<'a> {
    /// SPIR-V binary, as read from disk
    pub code: &'a [u8],
    pub stage: ShaderStage,
    /// Entry point name (usually "main")
    pub entry_point: &'a str,
}

/// Shader module trait
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;

    fn entry_point(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}
