//! # AOI Service
//!
//! Runs a [`VisibilityEngine`] on its own tokio task. All mutations and
//! queries travel through a command queue, so the engine only ever sees one
//! caller at a time, and ticks fire on a fixed interval derived from
//! `update_fps`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use aoi_system::*;
//! # async fn run<E: AoiEntity + 'static>(engine: VisibilityEngine<E>, entity: std::sync::Arc<E>) -> Result<(), AoiError> {
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let service = AoiService::spawn(engine, tx);
//! let handle = service.handle();
//!
//! handle.register(entity)?;
//! while let Some(update) = rx.recv().await {
//!     println!("{} now sees {:?}", update.watcher, update.current);
//! }
//! service.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::engine::{EngineStats, TickReport, VisibilityEngine, VisibilitySink};
use crate::entity::AoiEntity;
use crate::error::AoiError;
use crate::registry::EntityRegistry;
use crate::types::{EntityId, Position};

enum Command<E> {
    Register(Arc<E>),
    Unregister(Arc<E>),
    AttributeChanged(Arc<E>),
    VisibleObjects(Arc<E>, oneshot::Sender<Vec<EntityId>>),
    WatchersOf(Arc<E>, oneshot::Sender<Vec<EntityId>>),
    ObjectsInCircle(Position, f64, oneshot::Sender<Vec<EntityId>>),
    TickNow(oneshot::Sender<TickReport>),
    Stats(oneshot::Sender<EngineStats>),
}

/// Cloneable front door to a running [`AoiService`].
///
/// Mutations are validated on the caller's side and then queued; they take
/// effect in submission order. Queries wait for the service task to answer.
pub struct AoiHandle<E> {
    commands: mpsc::UnboundedSender<Command<E>>,
}

impl<E> Clone for AoiHandle<E> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<E: AoiEntity> AoiHandle<E> {
    fn send(&self, command: Command<E>) -> Result<(), AoiError> {
        self.commands
            .send(command)
            .map_err(|_| AoiError::ServiceStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command<E>,
    ) -> Result<T, AoiError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| AoiError::ServiceStopped)
    }

    /// Queues registration as an object, and as a watcher when it has vision.
    pub fn register(&self, entity: Arc<E>) -> Result<(), AoiError> {
        EntityRegistry::<E>::validate(&entity)?;
        self.send(Command::Register(entity))
    }

    pub fn unregister(&self, entity: Arc<E>) -> Result<(), AoiError> {
        EntityRegistry::<E>::validate(&entity)?;
        self.send(Command::Unregister(entity))
    }

    /// Reports that the entity's position or radii changed.
    pub fn attribute_changed(&self, entity: Arc<E>) -> Result<(), AoiError> {
        EntityRegistry::<E>::validate(&entity)?;
        self.send(Command::AttributeChanged(entity))
    }

    pub async fn visible_objects(&self, watcher: Arc<E>) -> Result<Vec<EntityId>, AoiError> {
        self.request(|tx| Command::VisibleObjects(watcher, tx)).await
    }

    pub async fn watchers_of(&self, object: Arc<E>) -> Result<Vec<EntityId>, AoiError> {
        self.request(|tx| Command::WatchersOf(object, tx)).await
    }

    pub async fn objects_in_circle(
        &self,
        center: Position,
        radius: f64,
    ) -> Result<Vec<EntityId>, AoiError> {
        self.request(|tx| Command::ObjectsInCircle(center, radius, tx))
            .await
    }

    /// Runs a tick immediately instead of waiting for the interval.
    pub async fn tick_now(&self) -> Result<TickReport, AoiError> {
        self.request(Command::TickNow).await
    }

    pub async fn stats(&self) -> Result<EngineStats, AoiError> {
        self.request(Command::Stats).await
    }
}

/// A visibility engine running on a background task.
pub struct AoiService<E> {
    handle: AoiHandle<E>,
    shutdown_sender: broadcast::Sender<()>,
    task: JoinHandle<EngineStats>,
}

impl<E: AoiEntity + 'static> AoiService<E> {
    /// Moves the engine onto a new task that delivers updates to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(engine: VisibilityEngine<E>, sink: S) -> Self
    where
        S: VisibilitySink + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_sender, shutdown_receiver) = broadcast::channel(1);
        let period = engine.tick_interval();

        info!("🎯 AOI service started, ticking every {}ms", period.as_millis());
        let task = tokio::spawn(run_loop(engine, sink, commands_rx, shutdown_receiver, period));

        Self {
            handle: AoiHandle {
                commands: commands_tx,
            },
            shutdown_sender,
            task,
        }
    }

    pub fn handle(&self) -> AoiHandle<E> {
        self.handle.clone()
    }

    /// Stops ticking, clears the engine and returns its final counters.
    ///
    /// Commands still queued when the signal arrives are dropped; handles
    /// report [`AoiError::ServiceStopped`] from then on.
    pub async fn stop(self) -> Result<EngineStats, AoiError> {
        info!("🛑 Stopping AOI service...");
        let _ = self.shutdown_sender.send(());
        self.task.await.map_err(|_| AoiError::ServiceStopped)
    }
}

async fn run_loop<E, S>(
    mut engine: VisibilityEngine<E>,
    mut sink: S,
    mut commands: mpsc::UnboundedReceiver<Command<E>>,
    mut shutdown: broadcast::Receiver<()>,
    period: Duration,
) -> EngineStats
where
    E: AoiEntity,
    S: VisibilitySink,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            command = commands.recv() => match command {
                Some(command) => apply(&mut engine, &mut sink, command),
                None => break,
            },
            _ = ticker.tick() => {
                let report = engine.tick(&mut sink);
                if report.ran {
                    trace!(
                        "Tick processed {} watchers, {} notifications, {} failures",
                        report.watchers_processed, report.notifications, report.failures
                    );
                }
            }
        }
    }

    let stats = engine.stats().clone();
    engine.stop();
    info!("✅ AOI service stopped after {} ticks", stats.ticks_run);
    stats
}

fn apply<E, S>(engine: &mut VisibilityEngine<E>, sink: &mut S, command: Command<E>)
where
    E: AoiEntity,
    S: VisibilitySink,
{
    match command {
        Command::Register(entity) => {
            if let Err(e) = engine.register(entity) {
                warn!("Register rejected: {}", e);
            }
        }
        Command::Unregister(entity) => {
            if let Err(e) = engine.unregister(&entity) {
                warn!("Unregister rejected: {}", e);
            }
        }
        Command::AttributeChanged(entity) => {
            if let Err(e) = engine.on_attribute_changed(entity) {
                warn!("Attribute change rejected: {}", e);
            }
        }
        Command::VisibleObjects(watcher, reply) => {
            let _ = reply.send(engine.visible_objects_for(&watcher));
        }
        Command::WatchersOf(object, reply) => {
            let _ = reply.send(engine.watchers_for(&object));
        }
        Command::ObjectsInCircle(center, radius, reply) => {
            let _ = reply.send(engine.objects_in_circle(center, radius));
        }
        Command::TickNow(reply) => {
            debug!("Forced tick");
            let _ = reply.send(engine.tick(sink));
        }
        Command::Stats(reply) => {
            let _ = reply.send(engine.stats().clone());
        }
    }
}
