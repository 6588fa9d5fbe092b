//! Configuration system
//!
//! Engine settings are plain serde structs loaded from TOML (or RON). Every
//! field has a default, so a config file only lists what it overrides.
//!
//! `max_objects` is the capacity-planning input for the per-texture
//! descriptor pool: the number of distinct textures the application can load.
//! The default texture has a set of its own on top of that.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use crate::log::LogSeverity;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Config parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Config serialization error: {0}")]
    Serialize(String),

    /// Unsupported file extension
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but are inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

enum Format {
    Toml,
    Ron,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(Format::Toml),
        Some("ron") => Ok(Format::Ron),
        _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Configuration trait
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let contents = std::fs::read_to_string(path)?;
        match format {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match format_of(path)? {
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Ron => ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable the Khronos validation layer and debug messenger
    pub enable_validation: bool,
    /// Minimum severity forwarded to the logger
    pub log_level: LogSeverity,
    pub window: WindowConfig,
    pub renderer: RendererSettings,
    pub shaders: ShaderPaths,
    pub assets: AssetPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Vista".to_string(),
            app_version: (0, 1, 0),
            enable_validation: cfg!(debug_assertions),
            log_level: LogSeverity::Info,
            window: WindowConfig::default(),
            renderer: RendererSettings::default(),
            shaders: ShaderPaths::default(),
            assets: AssetPaths::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer cannot be built with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window extent must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate()
    }
}

/// Initial window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Vista".to_string(),
        }
    }
}

/// Frame orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Distinct textures that can be loaded, default texture not included
    pub max_objects: u32,
    /// Number of frame-in-flight slots
    pub frames_in_flight: u32,
    /// Clear color of the off-screen and presentable attachments
    pub clear_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            max_objects: 64,
            frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid("renderer.max_objects must be > 0".to_string()));
        }
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("renderer.frames_in_flight must be > 0".to_string()));
        }
        Ok(())
    }
}

/// SPIR-V binaries consumed by the two pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    pub scene_vertex: PathBuf,
    pub scene_fragment: PathBuf,
    pub composite_vertex: PathBuf,
    pub composite_fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            scene_vertex: PathBuf::from("shaders/scene.vert.spv"),
            scene_fragment: PathBuf::from("shaders/scene.frag.spv"),
            composite_vertex: PathBuf::from("shaders/composite.vert.spv"),
            composite_fragment: PathBuf::from("shaders/composite.frag.spv"),
        }
    }
}

/// Asset locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Directory material texture file names are resolved against
    pub texture_dir: PathBuf,
    /// Texture for slot 0; a 1x1 white texel when absent
    pub default_texture: Option<PathBuf>,
    /// Model loaded by the demo
    pub model: Option<PathBuf>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("textures"),
            default_texture: None,
            model: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
