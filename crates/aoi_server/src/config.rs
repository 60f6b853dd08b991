//! Configuration management for the AOI server.
//!
//! Loads the engine, logging and simulation settings from a single TOML file,
//! writing a default one on first start.

use aoi_system::{AoiConfig, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_watchers() -> usize {
    8
}

fn default_objects() -> usize {
    64
}

fn default_vision_radius() -> f64 {
    80.0
}

fn default_collision_radius() -> f64 {
    2.0
}

fn default_step_ms() -> u64 {
    100
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Visibility engine settings
    #[serde(default)]
    pub aoi: AoiConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Built-in world simulation
    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Population and pacing of the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Players carrying a vision radius
    #[serde(default = "default_watchers")]
    pub watchers: usize,
    /// Monsters without vision
    #[serde(default = "default_objects")]
    pub objects: usize,
    #[serde(default = "default_vision_radius")]
    pub vision_radius: f64,
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f64,
    /// Milliseconds between two movement steps
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Steps to run before exiting, 0 runs until a shutdown signal
    #[serde(default)]
    pub ticks: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            watchers: default_watchers(),
            objects: default_objects(),
            vision_radius: default_vision_radius(),
            collision_radius: default_collision_radius(),
            step_ms: default_step_ms(),
            ticks: 0,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file, creating it with defaults if missing.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aoi.validate()?;

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aoi, AoiConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.simulation.watchers, 8);
        assert_eq!(config.simulation.ticks, 0);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aoi.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.simulation, SimulationSettings::default());
        assert!(path.exists());

        // The written defaults load back unchanged
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.aoi, config.aoi);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[aoi]
world = { x = -500.0, y = -500.0, width = 1000.0, height = 1000.0 }
max_objects = 6
update_fps = 20

[logging]
level = "debug"
json_format = true

[simulation]
watchers = 2
ticks = 50
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.aoi.world.x, -500.0);
        assert_eq!(config.aoi.max_objects, 6);
        assert_eq!(config.aoi.max_levels, 4);
        assert_eq!(config.aoi.update_fps, 20);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.simulation.watchers, 2);
        assert_eq!(config.simulation.objects, 64);
        assert_eq!(config.simulation.ticks, 50);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[aoi\nmax_objects = ").await.unwrap();

        let result = AppConfig::load_from_file(temp_file.path()).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));

        for level in VALID_LOG_LEVELS {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_validation_checks_engine_settings() {
        let mut config = AppConfig::default();
        config.aoi.update_fps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTickRate(0))));
    }
}
