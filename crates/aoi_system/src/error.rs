//! Error types for the AOI system.

use crate::types::{EntityId, EntityKind};

/// Registration errors. These indicate a caller bug and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Entity id is missing or empty")]
    MissingId,

    #[error("Entity id {0} has no type prefix")]
    MissingKind(String),

    #[error("Entity {id} declares kind {declared} but its id prefix resolves to {resolved}")]
    KindMismatch {
        id: EntityId,
        declared: EntityKind,
        resolved: EntityKind,
    },
}

/// Errors raised by the visibility engine and its service loop.
#[derive(Debug, thiserror::Error)]
pub enum AoiError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to deliver visibility update for {0}")]
    Delivery(EntityId),

    #[error("AOI service has stopped")]
    ServiceStopped,
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("World bounds must have a positive width and height (got {width}x{height})")]
    InvalidWorld { width: f64, height: f64 },

    #[error("max_objects must be at least 1")]
    InvalidMaxObjects,

    #[error("update_fps must be between 1 and 1000 (got {0})")]
    InvalidTickRate(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
