//! # Visibility Engine
//!
//! Maintains two lazily rebuilt quadtrees, one over watchers' vision circles
//! and one over objects' collision circles, and turns them into per-tick
//! visibility notifications.
//!
//! ## Flow
//!
//! 1. Registration, removal and attribute changes only flip dirty flags
//! 2. [`VisibilityEngine::tick`] rebuilds the object index if it is stale
//! 3. Every watcher's visible set is recomputed and compared with the set it
//!    saw on the previous tick
//! 4. Changes are handed to a [`VisibilitySink`]
//!
//! The watcher index is only rebuilt when [`VisibilityEngine::watchers_for`]
//! needs it; tick processing never reads it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::AoiConfig;
use crate::entity::{AoiEntity, RadiusAccessors};
use crate::error::{AoiError, ConfigError, RegistryError};
use crate::registry::EntityRegistry;
use crate::spatial::{IndexedRect, SpatialIndex};
use crate::types::{could_be_watched, Bounds, EntityId, Position};

// ============================================================================
// Notifications
// ============================================================================

/// One watcher's visibility change for a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityUpdate {
    /// Watcher whose view changed
    pub watcher: EntityId,
    /// Objects visible this tick
    pub current: Vec<EntityId>,
    /// Objects visible on the previous tick, empty if there was none
    pub previous: Vec<EntityId>,
}

impl VisibilityUpdate {
    /// Objects that entered the watcher's view.
    pub fn added(&self) -> Vec<EntityId> {
        let previous: HashSet<&EntityId> = self.previous.iter().collect();
        self.current
            .iter()
            .filter(|id| !previous.contains(id))
            .cloned()
            .collect()
    }

    /// Objects that left the watcher's view.
    pub fn removed(&self) -> Vec<EntityId> {
        let current: HashSet<&EntityId> = self.current.iter().collect();
        self.previous
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect()
    }

    pub fn is_changed(&self) -> bool {
        !same_members(&self.current, &self.previous)
    }
}

/// Outbound transport for visibility notifications.
pub trait VisibilitySink {
    fn deliver(&mut self, update: VisibilityUpdate) -> Result<(), AoiError>;
}

impl VisibilitySink for Vec<VisibilityUpdate> {
    fn deliver(&mut self, update: VisibilityUpdate) -> Result<(), AoiError> {
        self.push(update);
        Ok(())
    }
}

impl VisibilitySink for mpsc::UnboundedSender<VisibilityUpdate> {
    fn deliver(&mut self, update: VisibilityUpdate) -> Result<(), AoiError> {
        self.send(update)
            .map_err(|mpsc::error::SendError(update)| AoiError::Delivery(update.watcher))
    }
}

fn same_members(a: &[EntityId], b: &[EntityId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let a: HashSet<&EntityId> = a.iter().collect();
    b.iter().all(|id| a.contains(id))
}

// ============================================================================
// Bookkeeping
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct DirtyFlags {
    watchers: bool,
    objects: bool,
    pending: bool,
}

/// Outcome of a single [`VisibilityEngine::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// False when nothing changed since the previous tick
    pub ran: bool,
    pub rebuilt_objects: bool,
    pub watchers_processed: usize,
    pub notifications: usize,
    pub failures: usize,
}

/// Cumulative engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub ticks_run: u64,
    pub object_rebuilds: u64,
    pub watcher_rebuilds: u64,
    pub notifications: u64,
    pub failures: u64,
}

// ============================================================================
// Engine
// ============================================================================

/// Area-of-interest engine over entities of type `E`.
///
/// Not internally synchronised: a multi-threaded host must funnel all calls
/// through one owner, as [`AoiService`](crate::AoiService) does.
pub struct VisibilityEngine<E> {
    radii: RadiusAccessors<E>,
    watcher_index: SpatialIndex,
    object_index: SpatialIndex,
    watchers: EntityRegistry<E>,
    objects: EntityRegistry<E>,
    snapshots: HashMap<EntityId, Vec<EntityId>>,
    dirty: DirtyFlags,
    stats: EngineStats,
    tick_interval: Duration,
}

impl<E: AoiEntity> VisibilityEngine<E> {
    pub fn new(config: &AoiConfig, radii: RadiusAccessors<E>) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = || SpatialIndex::new(config.world, config.max_objects, config.max_levels);
        Ok(Self {
            radii,
            watcher_index: index(),
            object_index: index(),
            watchers: EntityRegistry::new(),
            objects: EntityRegistry::new(),
            snapshots: HashMap::new(),
            dirty: DirtyFlags::default(),
            stats: EngineStats::default(),
            tick_interval: config.tick_interval(),
        })
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Adds the entity to the watcher pool if its vision radius is positive.
    /// Returns whether it was newly added.
    ///
    /// Registering an id that is already pooled swaps in the new handle and
    /// still invalidates the watcher index.
    pub fn register_watcher(&mut self, entity: Arc<E>) -> Result<bool, RegistryError> {
        EntityRegistry::<E>::validate(&entity)?;
        if !self.radii.is_watcher(&entity) {
            return Ok(false);
        }
        let added = self.watchers.add(entity)?;
        self.dirty.watchers = true;
        self.dirty.pending = true;
        Ok(added)
    }

    /// Adds or replaces the entity in the object pool. Returns whether it was
    /// newly added.
    pub fn register_object(&mut self, entity: Arc<E>) -> Result<bool, RegistryError> {
        let added = self.objects.add(entity)?;
        self.dirty.objects = true;
        self.dirty.pending = true;
        Ok(added)
    }

    /// Registers an entity as an object and, when it has vision, as a watcher.
    pub fn register(&mut self, entity: Arc<E>) -> Result<(), RegistryError> {
        self.register_watcher(entity.clone())?;
        self.register_object(entity)?;
        Ok(())
    }

    /// Removes an entity from both pools and forgets what it saw.
    pub fn unregister(&mut self, entity: &E) -> Result<(), RegistryError> {
        if self.watchers.remove(entity)? {
            self.dirty.watchers = true;
            self.dirty.pending = true;
        }
        if self.objects.remove(entity)? {
            self.dirty.objects = true;
            self.dirty.pending = true;
        }
        self.snapshots.remove(entity.id());
        Ok(())
    }

    /// Re-evaluates watcher membership after a radius or position change.
    ///
    /// Both indexes are invalidated since the engine does not track which
    /// attribute changed. A watcher that loses its vision leaves the pool and
    /// its snapshot goes with it.
    pub fn on_attribute_changed(&mut self, entity: Arc<E>) -> Result<(), RegistryError> {
        let is_watcher_now = self.radii.is_watcher(&entity);
        let was_watcher = self.watchers.contains(&entity);

        if is_watcher_now && !was_watcher {
            self.watchers.add(entity)?;
        } else if !is_watcher_now && was_watcher {
            self.watchers.remove(&entity)?;
            self.snapshots.remove(entity.id());
        } else {
            EntityRegistry::<E>::validate(&entity)?;
        }

        self.dirty.watchers = true;
        self.dirty.objects = true;
        self.dirty.pending = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    /// Rebuilds the object index if it is stale. Returns whether it ran.
    pub fn rebuild_object_index(&mut self) -> bool {
        if !self.dirty.objects {
            return false;
        }

        self.object_index.clear();
        for object in self.objects.iter() {
            if object.is_invisible() {
                continue;
            }
            let Some(position) = object.position() else {
                continue;
            };
            let radius = self.radii.collision_radius(object);
            self.object_index.insert(IndexedRect::new(
                Bounds::around(position, radius),
                object.id().clone(),
            ));
        }

        self.dirty.objects = false;
        self.stats.object_rebuilds += 1;
        debug!("Rebuilt object index with {} entries", self.object_index.len());
        true
    }

    /// Rebuilds the watcher index if it is stale. Returns whether it ran.
    ///
    /// Watchers in battle are left out: their view comes from their role list.
    pub fn rebuild_watcher_index(&mut self) -> bool {
        if !self.dirty.watchers {
            return false;
        }

        self.watcher_index.clear();
        for watcher in self.watchers.iter() {
            if watcher.is_in_battle() {
                continue;
            }
            let Some(position) = watcher.position() else {
                continue;
            };
            let vision = self.radii.vision_radius(watcher);
            if vision > 0.0 {
                self.watcher_index.insert(IndexedRect::new(
                    Bounds::around(position, vision),
                    watcher.id().clone(),
                ));
            }
        }

        self.dirty.watchers = false;
        self.stats.watcher_rebuilds += 1;
        debug!("Rebuilt watcher index with {} entries", self.watcher_index.len());
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Ids of the objects `watcher` can currently see.
    ///
    /// Reads the object index as it stands; stale until the next tick.
    pub fn visible_objects_for(&self, watcher: &E) -> Vec<EntityId> {
        if watcher.is_in_battle() {
            return self.battle_view(watcher);
        }

        let Some(position) = watcher.position() else {
            return Vec::new();
        };
        let vision = self.radii.vision_radius(watcher);
        let query = Bounds::around(position, vision);

        self.object_index
            .retrieve(&query)
            .into_iter()
            .filter(|candidate| {
                could_be_watched(
                    position,
                    vision,
                    candidate.bounds.center(),
                    candidate.bounds.half_width(),
                )
            })
            .map(|candidate| candidate.owner.clone())
            .collect()
    }

    /// Role list in order, minus invisible roles and roles no longer pooled.
    fn battle_view(&self, watcher: &E) -> Vec<EntityId> {
        watcher
            .battle_roles()
            .into_iter()
            .filter(|role| match self.objects.get(role) {
                Some(entity) => !entity.is_invisible(),
                None => {
                    debug!("Battle role {} of {} is not registered", role, watcher.id());
                    false
                }
            })
            .collect()
    }

    /// Ids of the watchers that can currently see `object`.
    ///
    /// Rebuilds the watcher index first if it is stale.
    pub fn watchers_for(&mut self, object: &E) -> Vec<EntityId> {
        self.rebuild_watcher_index();

        let Some(position) = object.position() else {
            return Vec::new();
        };
        let collision = self.radii.collision_radius(object);
        let query = Bounds::around(position, collision);

        self.watcher_index
            .retrieve(&query)
            .into_iter()
            .filter(|candidate| {
                could_be_watched(
                    candidate.bounds.center(),
                    candidate.bounds.half_width(),
                    position,
                    collision,
                )
            })
            .map(|candidate| candidate.owner.clone())
            .collect()
    }

    /// Ids of indexed objects whose centre lies strictly inside the circle.
    pub fn objects_in_circle(&self, center: Position, radius: f64) -> Vec<EntityId> {
        let query = Bounds::around(center, radius);
        self.object_index
            .retrieve(&query)
            .into_iter()
            .filter(|candidate| center.distance(candidate.bounds.center()) < radius)
            .map(|candidate| candidate.owner.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Recomputes every watcher's view and delivers the differences.
    ///
    /// Does nothing unless something changed since the last tick. A delivery
    /// failure for one watcher is logged and counted; the rest are still
    /// processed.
    pub fn tick<S: VisibilitySink + ?Sized>(&mut self, sink: &mut S) -> TickReport {
        let mut report = TickReport::default();
        if !self.dirty.pending {
            return report;
        }
        report.ran = true;
        report.rebuilt_objects = self.rebuild_object_index();

        let watchers: Vec<Arc<E>> = self.watchers.iter().cloned().collect();
        for watcher in &watchers {
            report.watchers_processed += 1;

            let current = self.visible_objects_for(watcher);
            let id = watcher.id().clone();
            let previous = self.snapshots.insert(id.clone(), current.clone());
            let should_notify = match &previous {
                Some(previous) => !same_members(&current, previous),
                None => !current.is_empty(),
            };
            if !should_notify {
                continue;
            }

            let update = VisibilityUpdate {
                watcher: id,
                current,
                previous: previous.unwrap_or_default(),
            };
            match sink.deliver(update) {
                Ok(()) => report.notifications += 1,
                Err(e) => {
                    warn!("{}", e);
                    report.failures += 1;
                }
            }
        }

        self.dirty.pending = false;
        self.stats.ticks_run += 1;
        self.stats.notifications += report.notifications as u64;
        self.stats.failures += report.failures as u64;
        report
    }

    /// Clears both indexes, all snapshots and both pools.
    pub fn stop(&mut self) {
        self.watcher_index.clear();
        self.object_index.clear();
        self.snapshots.clear();
        self.watchers.clear();
        self.objects.clear();
        self.dirty = DirtyFlags::default();
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn is_pending(&self) -> bool {
        self.dirty.pending
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_watcher(&self, id: &EntityId) -> bool {
        self.watchers.contains_id(id)
    }

    pub fn is_object(&self, id: &EntityId) -> bool {
        self.objects.contains_id(id)
    }

    pub fn watcher(&self, id: &EntityId) -> Option<&Arc<E>> {
        self.watchers.get(id)
    }

    pub fn object(&self, id: &EntityId) -> Option<&Arc<E>> {
        self.objects.get(id)
    }

    /// The set `watcher` saw on the last tick it was processed.
    pub fn snapshot(&self, watcher: &EntityId) -> Option<&[EntityId]> {
        self.snapshots.get(watcher).map(Vec::as_slice)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Scheduling period derived from the configured update rate.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn radii(&self) -> &RadiusAccessors<E> {
        &self.radii
    }
}
