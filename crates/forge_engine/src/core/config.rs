//! Configuration loading, saving, and validation.
//!
//! Config types are plain serde structs. The [`Config`] trait adds file
//! persistence on top, dispatching on the file extension: `.toml` and
//! `.ron` are supported. Every config type carries a `validate` method
//! that is called before the renderer consumes it.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading, saving, or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File contents did not parse as the expected format.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Value could not be serialized.
    #[error("config serialize error: {0}")]
    Serialize(String),
    /// File extension is not a supported config format.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    /// Values are out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// File persistence for serde-backed config types.
///
/// The format is picked from the file extension, so the same type can be
/// stored as TOML for hand editing or RON for tool output.
pub trait Config: Serialize + DeserializeOwned {
    /// Load a config value from a `.toml` or `.ron` file.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match extension(path) {
            Some("toml") => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            Some("ron") => {
                let content = std::fs::read_to_string(path)?;
                ron::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Save a config value to a `.toml` or `.ron` file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Locations of the compiled SPIR-V shaders the renderer loads at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShaderConfig {
    /// Path to the compiled vertex shader.
    pub vertex_shader_path: String,
    /// Path to the compiled fragment shader.
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Shader paths as given, with no search applied.
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex.into(),
            fragment_shader_path: fragment.into(),
        }
    }

    /// Resolve bare shader file names against the usual output and source
    /// directories, falling back to the name unchanged when nothing exists
    /// on disk yet.
    pub fn with_path_resolution(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex_shader_path: resolve_shader_path(vertex),
            fragment_shader_path: resolve_shader_path(fragment),
        }
    }

    /// Check that both paths are non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vertex_shader_path.is_empty() {
            return Err(ConfigError::Invalid("vertex shader path is empty".into()));
        }
        if self.fragment_shader_path.is_empty() {
            return Err(ConfigError::Invalid("fragment shader path is empty".into()));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("quad.vert.spv", "quad.frag.spv")
    }
}

/// Directories searched when resolving a bare shader file name. Ordered
/// from build output to in-tree fallbacks.
const SHADER_SEARCH_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../shaders/",
    "./",
];

fn resolve_shader_path(name: &str) -> String {
    for dir in SHADER_SEARCH_DIRS {
        let candidate = format!("{dir}{name}");
        if Path::new(&candidate).exists() {
            return candidate;
        }
    }
    name.to_string()
}

/// Renderer startup settings.
///
/// Built either from a config file via [`Config::load_from_file`] or in
/// code with the `with_*` builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name reported to the graphics driver.
    pub application_name: String,
    /// Application version reported to the graphics driver.
    pub application_version: (u32, u32, u32),
    /// Compiled shader locations.
    pub shaders: ShaderConfig,
    /// Number of frames the CPU may record ahead of the GPU.
    pub max_frames_in_flight: usize,
    /// RGBA clear color applied at the start of every frame.
    pub clear_color: [f32; 4],
    /// Requested multisample count. Clamped to what the device supports.
    pub msaa_samples: u32,
    /// Force validation layers on or off. `None` follows the build profile.
    pub enable_validation: Option<bool>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Forge Application".to_string(),
            application_version: (0, 1, 0),
            shaders: ShaderConfig::default(),
            max_frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            msaa_samples: 4,
            enable_validation: None,
        }
    }
}

impl RendererConfig {
    /// Default config with the given application name.
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Set the application version reported to the driver.
    #[must_use]
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set the shader locations.
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set how many frames the CPU may record ahead of the GPU.
    #[must_use]
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set the clear color.
    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Request a multisample count. Must be a power of two in `2..=64`.
    #[must_use]
    pub fn with_msaa_samples(mut self, samples: u32) -> Self {
        self.msaa_samples = samples;
        self
    }

    /// Force validation layers on or off regardless of build profile.
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be enabled. Defaults to on in
    /// debug builds when not set explicitly.
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Check that all values are in their legal ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name is empty".into()));
        }
        if !(1..=8).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "max_frames_in_flight must be in 1..=8, got {}",
                self.max_frames_in_flight
            )));
        }
        if !self.msaa_samples.is_power_of_two() || !(2..=64).contains(&self.msaa_samples) {
            return Err(ConfigError::Invalid(format!(
                "msaa_samples must be a power of two in 2..=64, got {}",
                self.msaa_samples
            )));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("clear_color must be finite".into()));
        }
        self.shaders.validate()
    }
}

impl Config for RendererConfig {}
impl Config for ShaderConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let config = RendererConfig::default().with_max_frames_in_flight(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn excessive_frames_in_flight_is_rejected() {
        let config = RendererConfig::default().with_max_frames_in_flight(9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_power_of_two_msaa_is_rejected() {
        let config = RendererConfig::default().with_msaa_samples(3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn single_sample_msaa_is_rejected() {
        // The forward pass always resolves, which needs at least 2 samples.
        let config = RendererConfig::default().with_msaa_samples(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders_set_fields() {
        let config = RendererConfig::new("Test App")
            .with_version(1, 2, 3)
            .with_max_frames_in_flight(3)
            .with_clear_color([0.1, 0.2, 0.3, 1.0])
            .with_msaa_samples(8)
            .with_validation(false);
        assert_eq!(config.application_name, "Test App");
        assert_eq!(config.application_version, (1, 2, 3));
        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.msaa_samples, 8);
        assert!(!config.validation_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let config = RendererConfig::new("Round Trip").with_msaa_samples(8);
        let text = toml::to_string_pretty(&config).unwrap();
        let back: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.application_name, "Round Trip");
        assert_eq!(back.msaa_samples, 8);
    }

    #[test]
    fn ron_round_trip_preserves_values() {
        let config = RendererConfig::new("Round Trip").with_max_frames_in_flight(3);
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let back: RendererConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.application_name, "Round Trip");
        assert_eq!(back.max_frames_in_flight, 3);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = RendererConfig::load_from_file("renderer.yaml");
        assert!(matches!(err, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn empty_shader_path_is_rejected() {
        let shaders = ShaderConfig::new("", "frag.spv");
        assert!(shaders.validate().is_err());
    }
}
