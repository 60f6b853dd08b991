//! # AOI System
//!
//! Area-of-interest visibility for 2D game worlds. Every tick the engine
//! works out which objects each watcher can see and reports the watchers
//! whose view changed.
//!
//! ## Core Features
//!
//! - **Quadtree Indexing**: Bounded region quadtrees over vision and collision circles
//! - **Lazy Rebuilds**: Mutations flip dirty flags; indexes are rebuilt only when read
//! - **Visibility Diffs**: Each notification carries the current and previous view
//! - **Battle Views**: Watchers in battle see their role list instead of their surroundings
//! - **Async Service**: A tokio task owns the engine and ticks it at a fixed rate
//!
//! ## Visibility Rule
//!
//! A watcher at `W` with vision radius `v` sees an object at `O` with collision
//! radius `c` when `distance(W, O) < v + c`. Touching circles are not visible,
//! and the relation is not symmetric.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use aoi_system::*;
//! use std::sync::Arc;
//!
//! struct Unit {
//!     id: EntityId,
//!     position: Position,
//!     sight: f64,
//! }
//!
//! impl AoiEntity for Unit {
//!     fn id(&self) -> &EntityId {
//!         &self.id
//!     }
//!
//!     fn kind(&self) -> EntityKind {
//!         EntityKind::new("Player")
//!     }
//!
//!     fn position(&self) -> Option<Position> {
//!         Some(self.position)
//!     }
//! }
//!
//! let radii = RadiusAccessors::new(|u: &Unit| Some(u.sight), |_: &Unit| None);
//! let mut engine = VisibilityEngine::new(&AoiConfig::default(), radii).unwrap();
//!
//! engine
//!     .register(Arc::new(Unit {
//!         id: EntityId::parse("Player_1").unwrap(),
//!         position: Position::new(10.0, 10.0),
//!         sight: 5.0,
//!     }))
//!     .unwrap();
//!
//! let mut updates: Vec<VisibilityUpdate> = Vec::new();
//! engine.tick(&mut updates);
//! assert_eq!(updates.len(), 1);
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod registry;
pub mod service;
pub mod spatial;
pub mod types;

pub use config::AoiConfig;
pub use engine::{EngineStats, TickReport, VisibilityEngine, VisibilitySink, VisibilityUpdate};
pub use entity::{AoiEntity, RadiusAccessors, RadiusFn};
pub use error::{AoiError, ConfigError, RegistryError};
pub use registry::EntityRegistry;
pub use service::{AoiHandle, AoiService};
pub use spatial::{IndexStats, IndexedRect, NodeStats, QuadTreeNode, SpatialIndex};
pub use types::{could_be_watched, Bounds, EntityId, EntityKind, Position};
