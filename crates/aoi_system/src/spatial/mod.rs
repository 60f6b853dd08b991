//! Spatial indexing for the visibility engine
//!
//! A region quadtree stores the bounding squares of vision and collision
//! circles and answers broad-phase overlap queries.

mod quadtree;

pub use quadtree::{IndexStats, IndexedRect, NodeStats, QuadTreeNode, SpatialIndex, NE, NW, SE, SW};
