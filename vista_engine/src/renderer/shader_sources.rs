/// Shader binaries and the modules built from them
///
/// The engine does not compile shaders. It reads four SPIR-V files and hands
/// them to the device as opaque byte blobs; shader modules outlive pipeline
/// rebuilds.

use std::path::Path;
use std::sync::Arc;
use crate::config::ShaderPaths;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Shader, ShaderDesc, ShaderStage};
use crate::engine_err;

const ENTRY_POINT: &str = "main";

/// SPIR-V binaries of the scene and composite pipelines
#[derive(Debug, Clone, Default)]
pub struct ShaderSources {
    pub scene_vertex: Vec<u8>,
    pub scene_fragment: Vec<u8>,
    pub composite_vertex: Vec<u8>,
    pub composite_fragment: Vec<u8>,
}

impl ShaderSources {
    /// Read every binary named in `paths`
    ///
    /// A missing or unreadable file fails with `ShaderLoad`.
    pub fn load(paths: &ShaderPaths) -> Result<Self> {
        Ok(Self {
            scene_vertex: read_binary(&paths.scene_vertex)?,
            scene_fragment: read_binary(&paths.scene_fragment)?,
            composite_vertex: read_binary(&paths.composite_vertex)?,
            composite_fragment: read_binary(&paths.composite_fragment)?,
        })
    }
}

fn read_binary(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        engine_err!("vista::Renderer", ShaderLoad, "Failed to read shader '{}': {}", path.display(), e)
    })
}

/// Shader modules, created once per renderer
pub(crate) struct ShaderModules {
    pub scene_vertex: Arc<dyn Shader>,
    pub scene_fragment: Arc<dyn Shader>,
    pub composite_vertex: Arc<dyn Shader>,
    pub composite_fragment: Arc<dyn Shader>,
}

impl ShaderModules {
    pub fn create(device: &dyn GraphicsDevice, sources: &ShaderSources) -> Result<Self> {
        let module = |code: &[u8], stage| {
            device.create_shader(ShaderDesc { code, stage, entry_point: ENTRY_POINT })
        };
        Ok(Self {
            scene_vertex: module(&sources.scene_vertex, ShaderStage::Vertex)?,
            scene_fragment: module(&sources.scene_fragment, ShaderStage::Fragment)?,
            composite_vertex: module(&sources.composite_vertex, ShaderStage::Vertex)?,
            composite_fragment: module(&sources.composite_fragment, ShaderStage::Fragment)?,
        })
    }
}

#[cfg(test)]
#[path = "shader_sources_tests.rs"]
mod tests;
