//! Main application entry point for the AOI server
//!
//! Loads configuration, starts the visibility service and drives it with a
//! deterministic world simulation until a shutdown signal or the configured
//! number of steps.

mod cli;
mod config;
mod logging;
mod signals;
mod simulation;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant};
use tracing::{error, info, warn};

use aoi_system::{AoiService, VisibilityEngine, VisibilityUpdate};

use cli::CliArgs;
use config::AppConfig;
use simulation::{radius_accessors, Simulation};

const HEALTH_PERIOD: Duration = Duration::from_secs(10);

/// Main application struct
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Loads configuration, applies CLI overrides and sets up logging.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(watchers) = args.watchers {
            config.simulation.watchers = watchers;
        }
        if let Some(objects) = args.objects {
            config.simulation.objects = objects;
        }
        if let Some(ticks) = args.ticks {
            config.simulation.ticks = ticks;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        logging::setup_logging(&config.logging)?;
        display_banner();

        info!("📂 Config: {}", args.config_path.display());
        Ok(Self { config })
    }

    /// Runs the service and simulation until shutdown.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let aoi = &self.config.aoi;
        let sim_settings = &self.config.simulation;

        info!("📋 Configuration Summary:");
        info!(
            "  🌍 World: {:.0}x{:.0} at ({:.0}, {:.0})",
            aoi.world.width, aoi.world.height, aoi.world.x, aoi.world.y
        );
        info!(
            "  🌳 Quadtree: {} objects per node, {} levels",
            aoi.max_objects, aoi.max_levels
        );
        info!("  ⏱️ Visibility rate: {} Hz", aoi.update_fps);
        info!(
            "  👥 Population: {} players, {} monsters",
            sim_settings.watchers, sim_settings.objects
        );

        let engine = VisibilityEngine::new(aoi, radius_accessors())?;
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let service = AoiService::spawn(engine, update_tx);
        let handle = service.handle();

        let reporter = tokio::spawn(report_updates(update_rx, self.config.logging.json_format));

        let mut simulation = Simulation::populate(aoi.world, sim_settings);
        simulation.register_all(&handle)?;

        let mut ticker = interval(Duration::from_millis(sim_settings.step_ms.max(1)));
        let mut health = interval_at(Instant::now() + HEALTH_PERIOD, HEALTH_PERIOD);
        let mut last_notifications = 0u64;
        let shutdown = signals::wait_for_shutdown();
        tokio::pin!(shutdown);

        info!("✅ AOI server is now running!");
        if sim_settings.ticks == 0 {
            info!("🛑 Press Ctrl+C to gracefully shutdown");
        }

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    match result {
                        Ok(signal) => info!("📡 Received {}, initiating graceful shutdown...", signal),
                        Err(e) => warn!("Signal handling failed, shutting down: {}", e),
                    }
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = simulation.step(&handle) {
                        error!("❌ Simulation step failed: {}", e);
                        break;
                    }
                    if sim_settings.ticks > 0 && simulation.step_count() >= sim_settings.ticks {
                        info!("🏁 Completed {} simulation steps", simulation.step_count());
                        break;
                    }
                }
                _ = health.tick() => {
                    match handle.stats().await {
                        Ok(stats) => {
                            info!(
                                "📊 AOI Health - {} notifications/period | {} ticks | {} failures",
                                stats.notifications - last_notifications,
                                stats.ticks_run,
                                stats.failures
                            );
                            last_notifications = stats.notifications;
                        }
                        Err(e) => warn!("Stats request failed: {}", e),
                    }
                }
            }
        }

        drop(handle);
        let stats = service.stop().await?;
        let delivered = reporter.await?;

        info!("📊 Final Statistics:");
        info!("  - Ticks run: {}", stats.ticks_run);
        info!("  - Object index rebuilds: {}", stats.object_rebuilds);
        info!("  - Notifications: {} ({} delivered)", stats.notifications, delivered);
        info!("  - Failures: {}", stats.failures);
        info!("👋 AOI server shutdown complete");

        Ok(())
    }
}

/// Logs every visibility update until the service drops its sender. Returns
/// the number of updates seen.
async fn report_updates(mut updates: mpsc::UnboundedReceiver<VisibilityUpdate>, json: bool) -> u64 {
    let mut count = 0;
    while let Some(update) = updates.recv().await {
        count += 1;
        if json {
            match serde_json::to_string(&update) {
                Ok(line) => info!(target: "aoi::updates", "{}", line),
                Err(e) => warn!("Failed to encode update for {}: {}", update.watcher, e),
            }
        } else {
            info!(
                target: "aoi::updates",
                "👁️ {} sees {} objects (+{} / -{})",
                update.watcher,
                update.current.len(),
                update.added().len(),
                update.removed().len()
            );
        }
    }
    count
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Display startup banner using proper logging
fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║             🎯 AOI SERVER 🎯             ║");
    info!("║                  v{}                  ║", version);
    info!("║                                          ║");
    info!("║  Quadtree Area-of-Interest Visibility    ║");
    info!("║  with Lazy Index Rebuilds                ║");
    info!("╚══════════════════════════════════════════╝");
}
