//! Engine configuration.
//!
//! The world region, quadtree tuning and tick rate shared by both spatial
//! indexes. Loaded from the `[aoi]` table of the server's TOML file or built
//! in code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Bounds;

fn default_max_objects() -> usize {
    10
}

fn default_max_levels() -> u32 {
    4
}

fn default_update_fps() -> u32 {
    10
}

/// Configuration for a [`VisibilityEngine`](crate::VisibilityEngine) and the
/// service loop that drives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoiConfig {
    /// Region covered by both the watcher and the object index
    pub world: Bounds,
    /// A leaf splits once it holds more than this many rectangles
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
    /// Maximum quadtree depth
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    /// Visibility ticks per second
    #[serde(default = "default_update_fps")]
    pub update_fps: u32,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            world: Bounds::new(0.0, 0.0, 1000.0, 1000.0),
            max_objects: default_max_objects(),
            max_levels: default_max_levels(),
            update_fps: default_update_fps(),
        }
    }
}

impl AoiConfig {
    /// Configuration for a `width` x `height` world anchored at the origin.
    pub fn with_world_size(width: f64, height: f64) -> Self {
        Self {
            world: Bounds::new(0.0, 0.0, width, height),
            ..Self::default()
        }
    }

    /// Reads and validates a TOML file holding only the engine settings.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Period between two scheduled ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.update_fps.max(1)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if !(world.width > 0.0 && world.height > 0.0) {
            return Err(ConfigError::InvalidWorld {
                width: world.width,
                height: world.height,
            });
        }
        if self.max_objects == 0 {
            return Err(ConfigError::InvalidMaxObjects);
        }
        if self.update_fps == 0 || self.update_fps > 1000 {
            return Err(ConfigError::InvalidTickRate(self.update_fps));
        }
        Ok(())
    }
}
