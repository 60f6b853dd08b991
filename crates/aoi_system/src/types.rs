//! # Core Type Definitions
//!
//! Identifiers, type tags and 2D geometry shared by the spatial index and the
//! visibility engine.
//!
//! ## Key Types
//!
//! - [`EntityId`] - Textual `"<Type>_<key>"` identity of a game entity
//! - [`EntityKind`] - Explicit type tag derived from the id prefix
//! - [`Position`] - 2D world position
//! - [`Bounds`] - Axis-aligned rectangle used for regions and indexed shapes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RegistryError;

// ============================================================================
// Identity
// ============================================================================

/// Stable identity of an entity, formatted as `"<Type>_<key>"`.
///
/// # Examples
///
/// ```rust
/// use aoi_system::{EntityId, EntityKind};
///
/// let id = EntityId::parse("player_42").unwrap();
/// assert_eq!(id.kind(), Some(EntityKind::new("Player")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Parses an id, rejecting the empty string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, RegistryError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(RegistryError::MissingId);
        }
        Ok(Self(raw))
    }

    /// Builds an id from a kind and a unique key.
    pub fn compose(kind: &EntityKind, key: impl fmt::Display) -> Self {
        Self(format!("{}_{}", kind.as_str(), key))
    }

    /// The type tag encoded in the id prefix, if any.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_id(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Explicit type tag carried by every entity.
///
/// The registry buckets entities by kind, and ids carry their kind as a prefix
/// so an entity can be found from its id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(String);

impl EntityKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the kind from an id: the text before the first `_` with its
    /// first character upper-cased. Returns `None` when that prefix is empty.
    pub fn from_id(id: &str) -> Option<Self> {
        let prefix = id.split('_').next().unwrap_or_default();
        let mut chars = prefix.chars();
        let first = chars.next()?;
        let mut name: String = first.to_uppercase().collect();
        name.push_str(chars.as_str());
        Some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A point in the 2D world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance on raw coordinates.
    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle with its origin at the top-left corner.
///
/// Used both for the world region handed to the index and for the bounding
/// squares of indexed circles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Bounding square of the circle at `center` with `radius`.
    ///
    /// A radius of zero degenerates to a point.
    pub fn around(center: Position, radius: f64) -> Self {
        let r = radius.max(0.0);
        Self {
            x: center.x - r,
            y: center.y - r,
            width: r * 2.0,
            height: r * 2.0,
        }
    }

    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Radius of the circle this square was built around.
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Closed-interval overlap test.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }
}

/// Exact visibility test between a watcher's vision circle and an object's
/// collision circle. Equality is not visible.
pub fn could_be_watched(
    watcher: Position,
    vision_radius: f64,
    object: Position,
    collision_radius: f64,
) -> bool {
    watcher.distance(object) < vision_radius + collision_radius
}
