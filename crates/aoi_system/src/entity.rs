//! # Entity Contract
//!
//! The engine never owns game state. It reads entities through the
//! [`AoiEntity`] trait and reads their radii through a [`RadiusAccessors`]
//! record chosen at construction, so each deployment decides which of its
//! fields act as vision and collision radius.

use crate::types::{EntityId, EntityKind, Position};

/// Read-only view of a game entity as seen by the visibility engine.
///
/// Implementations are shared as `Arc<E>`; any mutable game state behind
/// them must use interior mutability.
pub trait AoiEntity: Send + Sync {
    /// Stable `"<Type>_<key>"` identity.
    fn id(&self) -> &EntityId;

    /// Explicit type tag; must match the id prefix.
    fn kind(&self) -> EntityKind;

    /// Current position. Entities without one are never indexed.
    fn position(&self) -> Option<Position>;

    /// Battle participants see a fixed role list instead of their surroundings.
    fn is_in_battle(&self) -> bool {
        false
    }

    /// Ids of the entities a watcher sees while in battle, in display order.
    fn battle_roles(&self) -> Vec<EntityId> {
        Vec::new()
    }

    /// Invisible objects are excluded from every index and role list.
    fn is_invisible(&self) -> bool {
        false
    }
}

/// Accessor for a radius attribute. `None` means the entity does not carry it.
pub type RadiusFn<E> = fn(&E) -> Option<f64>;

/// Named accessors for the vision and collision radius of an entity type.
pub struct RadiusAccessors<E> {
    vision: RadiusFn<E>,
    collision: RadiusFn<E>,
}

impl<E> RadiusAccessors<E> {
    pub fn new(vision: RadiusFn<E>, collision: RadiusFn<E>) -> Self {
        Self { vision, collision }
    }

    /// Vision radius, 0 when absent. Negative values are clamped to 0.
    pub fn vision_radius(&self, entity: &E) -> f64 {
        clamp_radius((self.vision)(entity))
    }

    /// Collision radius, 0 when absent. Negative values are clamped to 0.
    pub fn collision_radius(&self, entity: &E) -> f64 {
        clamp_radius((self.collision)(entity))
    }

    /// Only entities with a positive vision radius act as watchers.
    pub fn is_watcher(&self, entity: &E) -> bool {
        self.vision_radius(entity) > 0.0
    }
}

impl<E> Clone for RadiusAccessors<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RadiusAccessors<E> {}

impl<E> std::fmt::Debug for RadiusAccessors<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiusAccessors").finish_non_exhaustive()
    }
}

fn clamp_radius(radius: Option<f64>) -> f64 {
    match radius {
        Some(r) if r > 0.0 => r,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scout {
        id: EntityId,
        sight: Option<f64>,
        hitbox: Option<f64>,
    }

    impl AoiEntity for Scout {
        fn id(&self) -> &EntityId {
            &self.id
        }

        fn kind(&self) -> EntityKind {
            EntityKind::new("Scout")
        }

        fn position(&self) -> Option<Position> {
            None
        }
    }

    fn accessors() -> RadiusAccessors<Scout> {
        RadiusAccessors::new(|s| s.sight, |s| s.hitbox)
    }

    #[test]
    fn test_radius_defaults_and_clamping() {
        let radii = accessors();
        let scout = Scout {
            id: EntityId::parse("Scout_1").unwrap(),
            sight: None,
            hitbox: Some(-2.0),
        };

        assert_eq!(radii.vision_radius(&scout), 0.0);
        assert_eq!(radii.collision_radius(&scout), 0.0);
        assert!(!radii.is_watcher(&scout));
        assert!(!scout.is_in_battle());
        assert!(scout.battle_roles().is_empty());
        assert_eq!(scout.id().as_str(), "Scout_1");
    }

    #[test]
    fn test_positive_vision_makes_a_watcher() {
        let radii = accessors();
        let scout = Scout {
            id: EntityId::parse("Scout_2").unwrap(),
            sight: Some(12.5),
            hitbox: Some(1.0),
        };

        assert!(radii.is_watcher(&scout));
        assert_eq!(radii.vision_radius(&scout), 12.5);
        assert_eq!(radii.collision_radius(&scout), 1.0);
    }
}
