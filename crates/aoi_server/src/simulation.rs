//! Deterministic world simulation feeding the AOI service.
//!
//! Players (watchers) and monsters (plain objects) move on fixed circular
//! orbits laid out on a sunflower spiral around the world centre, so every
//! run produces the same visibility traffic.

use aoi_system::{
    AoiEntity, AoiError, AoiHandle, Bounds, EntityId, EntityKind, Position, RadiusAccessors,
};
use parking_lot::RwLock;
use std::f64::consts::TAU;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SimulationSettings;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

#[derive(Debug, Clone, Copy)]
struct Orbit {
    center: Position,
    radius: f64,
    /// Radians per step; the sign picks the direction
    angular_speed: f64,
    phase: f64,
}

impl Orbit {
    fn position_at(&self, step: u64) -> Position {
        let angle = self.phase + self.angular_speed * step as f64;
        Position::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }
}

/// A simulated player or monster.
#[derive(Debug)]
pub struct SimEntity {
    id: EntityId,
    kind: EntityKind,
    vision: Option<f64>,
    collision: Option<f64>,
    orbit: Orbit,
    position: RwLock<Position>,
}

impl SimEntity {
    fn new(
        kind: EntityKind,
        vision: Option<f64>,
        collision: Option<f64>,
        orbit: Orbit,
        world: &Bounds,
    ) -> Self {
        let id = EntityId::compose(&kind, Uuid::new_v4().simple());
        let position = clamp_to(world, orbit.position_at(0));
        Self {
            id,
            kind,
            vision,
            collision,
            orbit,
            position: RwLock::new(position),
        }
    }

    fn advance(&self, step: u64, world: &Bounds) -> Position {
        let next = clamp_to(world, self.orbit.position_at(step));
        *self.position.write() = next;
        next
    }
}

impl AoiEntity for SimEntity {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        self.kind.clone()
    }

    fn position(&self) -> Option<Position> {
        Some(*self.position.read())
    }
}

/// Vision and collision accessors for [`SimEntity`].
pub fn radius_accessors() -> RadiusAccessors<SimEntity> {
    RadiusAccessors::new(|e: &SimEntity| e.vision, |e: &SimEntity| e.collision)
}

fn clamp_to(world: &Bounds, p: Position) -> Position {
    Position::new(
        p.x.clamp(world.x, world.right()),
        p.y.clamp(world.y, world.bottom()),
    )
}

/// The simulated population and its step counter.
pub struct Simulation {
    world: Bounds,
    entities: Vec<Arc<SimEntity>>,
    step: u64,
}

impl Simulation {
    /// Lays out `settings.watchers` players followed by `settings.objects`
    /// monsters inside `world`.
    pub fn populate(world: Bounds, settings: &SimulationSettings) -> Self {
        let total = settings.watchers + settings.objects;
        let player = EntityKind::new("Player");
        let monster = EntityKind::new("Monster");
        let center = world.center();
        let spread = world.width.min(world.height) * 0.4;

        let entities = (0..total)
            .map(|i| {
                let fraction = ((i + 1) as f64 / total as f64).sqrt();
                let angle = i as f64 * GOLDEN_ANGLE;
                let orbit = Orbit {
                    center: Position::new(
                        center.x + spread * fraction * angle.cos(),
                        center.y + spread * fraction * angle.sin(),
                    ),
                    radius: 10.0 + (i % 7) as f64 * 5.0,
                    angular_speed: (if i % 2 == 0 { 1.0 } else { -1.0 }) * TAU
                        / (40.0 + (i % 5) as f64 * 10.0),
                    phase: angle,
                };

                let entity = if i < settings.watchers {
                    SimEntity::new(
                        player.clone(),
                        Some(settings.vision_radius),
                        Some(settings.collision_radius),
                        orbit,
                        &world,
                    )
                } else {
                    SimEntity::new(
                        monster.clone(),
                        None,
                        Some(settings.collision_radius),
                        orbit,
                        &world,
                    )
                };
                Arc::new(entity)
            })
            .collect();

        Self {
            world,
            entities,
            step: 0,
        }
    }

    pub fn entities(&self) -> &[Arc<SimEntity>] {
        &self.entities
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Registers the whole population with the service.
    pub fn register_all(&self, handle: &AoiHandle<SimEntity>) -> Result<(), AoiError> {
        for entity in &self.entities {
            handle.register(entity.clone())?;
        }
        Ok(())
    }

    /// Moves everyone one step along their orbit and reports the moves.
    pub fn step(&mut self, handle: &AoiHandle<SimEntity>) -> Result<(), AoiError> {
        self.step += 1;
        for entity in &self.entities {
            entity.advance(self.step, &self.world);
            handle.attribute_changed(entity.clone())?;
        }
        Ok(())
    }
}
