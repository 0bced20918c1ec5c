use std::path::Path;

use castor3d_types::SampleCount;
use glam::UVec2;
use serde::Deserialize;

use crate::ConfigError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VSyncMode {
    On,
    Off,
}

/// Engine wide settings, usually read from a TOML file.
///
/// Every field has a default so a config only needs to name what it changes:
///
/// ```toml
/// render_system = "gl3"
/// technique = "msaa"
/// samples = 4
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the render system to pick from the backend registry.
    pub render_system: String,
    /// Name of the render technique to pick from the technique registry.
    pub technique: String,
    /// Multisampling level for techniques which support it; 1 or 4.
    pub samples: u8,
    pub resolution: [u32; 2],
    pub wanted_fps: u32,
    pub vsync: VSyncMode,
    pub exposure: f32,
    /// Capture a backtrace for every posted frame event, even when
    /// `RUST_BACKTRACE` isn't set. Only has an effect in debug builds.
    pub debug_backtraces: bool,
    /// Keep every command a backend issues, for inspection.
    pub record_commands: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_system: "vulkan".into(),
            technique: "forward".into(),
            samples: 1,
            resolution: [1280, 720],
            wanted_fps: 60,
            vsync: VSyncMode::On,
            exposure: 1.0,
            debug_backtraces: false,
            record_commands: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn resolution(&self) -> UVec2 {
        UVec2::from(self.resolution)
    }

    /// Sample count, falling back to single sampling for unsupported values.
    pub fn sample_count(&self) -> SampleCount {
        SampleCount::try_from(self.samples).unwrap_or_else(|value| {
            log::warn!("Unsupported sample count {}, using 1", value);
            SampleCount::One
        })
    }

    pub fn render_system_options(&self) -> RenderSystemOptions {
        RenderSystemOptions {
            vsync: self.vsync,
            size: self.resolution,
            record_commands: self.record_commands,
        }
    }
}

/// What a render system factory receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSystemOptions {
    pub vsync: VSyncMode,
    pub size: [u32; 2],
    pub record_commands: bool,
}

impl RenderSystemOptions {
    pub fn aspect_ratio(&self) -> f32 {
        self.size[0] as f32 / self.size[1] as f32
    }
}

impl Default for RenderSystemOptions {
    fn default() -> Self {
        EngineConfig::default().render_system_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = EngineConfig::from_toml_str("render_system = \"gl3\"\nsamples = 4\nvsync = \"off\"").unwrap();
        assert_eq!(config.render_system, "gl3");
        assert_eq!(config.sample_count(), SampleCount::Four);
        assert_eq!(config.vsync, VSyncMode::Off);
        assert_eq!(config.technique, "forward");
        assert_eq!(config.resolution(), UVec2::new(1280, 720));
    }

    #[test]
    fn unsupported_samples_fall_back() {
        let config = EngineConfig::from_toml_str("samples = 3").unwrap();
        assert_eq!(config.sample_count(), SampleCount::One);
    }

    #[test]
    fn malformed_config() {
        assert!(EngineConfig::from_toml_str("samples = \"many\"").is_err());
    }
}
