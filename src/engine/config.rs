// Engine configuration file

use crate::engine::assets::{DescriptorFormat, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "engine.ron";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Clear colour as linear RGBA
    pub background: [f32; 4],
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 1280,
            height: 720,
            background: [0.1, 0.1, 0.12, 1.0],
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Resource table listing every named asset
    pub file: PathBuf,
    pub format: DescriptorFormat,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("assets/resources.ron"),
            format: DescriptorFormat::Ron,
        }
    }
}

/// Eviction thresholds per asset kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub shader_threshold: usize,
    pub program_threshold: usize,
    pub texture_threshold: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            shader_threshold: DEFAULT_THRESHOLD,
            program_threshold: DEFAULT_THRESHOLD,
            texture_threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Run the asset pipeline without opening a window
    pub headless: bool,
    pub default_program: String,
    pub default_texture: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: false,
            default_program: "asset.shader.basic".to_string(),
            default_texture: "asset.texture.checker".to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub resources: ResourcesConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        ron::de::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Load a configuration file, using defaults if it does not exist
    ///
    /// The returned flag is false when defaults were used. Logging is not
    /// initialised yet when this runs, so the caller reports the fallback.
    pub fn load_or_default(path: &Path) -> Result<(Self, bool), ConfigError> {
        if !path.exists() {
            return Ok((Self::default(), false));
        }
        Self::load(path).map(|config| (config, true))
    }

    /// Resolve the resource table path relative to the config file's directory
    pub fn resources_path(&self, config_path: &Path) -> PathBuf {
        if self.resources.file.is_absolute() {
            return self.resources.file.clone();
        }
        config_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.resources.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::test_support::Fixture;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.assets.texture_threshold, 10);
        assert_eq!(config.resources.format, DescriptorFormat::Ron);
        assert!(!config.renderer.headless);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_ron_str(
            r#"(
                window: (title: "Test", background: (0.0, 0.5, 1.0, 1.0)),
                assets: (texture_threshold: 2),
                logging: (level: Debug),
            )"#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.background, [0.0, 0.5, 1.0, 1.0]);
        assert_eq!(config.assets.texture_threshold, 2);
        assert_eq!(config.assets.program_threshold, 10);
        assert_eq!(
            log::LevelFilter::from(config.logging.level),
            log::LevelFilter::Debug
        );
    }

    #[test]
    fn test_malformed_config() {
        let result = EngineConfig::from_ron_str("(window: (width: \"wide\"))");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let fixture = Fixture::new();
        let (config, found) = EngineConfig::load_or_default(&fixture.path("engine.ron")).unwrap();
        assert!(!found);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let fixture = Fixture::new();
        let path = fixture.write(
            "config/engine.ron",
            r#"(resources: (file: "data/resources.xml", format: Xml), renderer: (headless: true))"#,
        );

        let (config, found) = EngineConfig::load_or_default(&path).unwrap();
        assert!(found);
        assert!(config.renderer.headless);
        assert_eq!(config.resources.format, DescriptorFormat::Xml);
        assert_eq!(
            config.resources_path(&path),
            fixture.path("config").join("data/resources.xml")
        );
    }
}
