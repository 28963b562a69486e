//! Application lifecycle for a grid node.
//!
//! Registers the configured regions, builds the router, reports routing
//! statistics while running and unregisters every region at shutdown.

use crate::{
    cli::CliArgs,
    config::{AppConfig, RoutingMode},
    logging::display_banner,
    signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent},
};
use simulation_service::{
    BasicScene, GuardedTransport, HybridSimulationConnector, LocalSimulationConnector,
    RoutingStats, SceneHandle, SimulationService, UnreachableTransport,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A running node: its configuration, hosted scenes and router.
pub struct Application {
    config: AppConfig,
    local: Arc<LocalSimulationConnector>,
    service: Arc<dyn SimulationService>,
    scenes: Vec<Arc<BasicScene>>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Host the configured regions and build the router
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(mode) = args.mode {
            config.node.mode = mode;
        }

        config
            .validate()
            .map_err(|e| format!("Configuration validation failed: {e}"))?;
        info!("✅ Configuration loaded and validated successfully");

        display_banner(&config.node.name);

        Ok(Self::from_config(config))
    }

    /// Hosts every configured region and builds the router for the
    /// configured mode.
    ///
    /// A region that cannot be hosted is logged and skipped; it never stops
    /// the node from starting.
    pub fn from_config(config: AppConfig) -> Self {
        let local = Arc::new(LocalSimulationConnector::new(config.simulation.clone()));

        let mut scenes = Vec::with_capacity(config.regions.len());
        for settings in &config.regions {
            let info = match settings.to_region_info() {
                Ok(info) => info,
                Err(e) => {
                    error!("❌ Skipping region {}: {}", settings.name, e);
                    continue;
                }
            };

            let scene = Arc::new(BasicScene::new(info).with_max_agents(settings.max_agents));
            for agent_id in &settings.banned_agents {
                scene.ban(*agent_id);
            }

            if local.add_region(scene.clone()).is_ok() {
                scenes.push(scene);
            }
        }

        let service: Arc<dyn SimulationService> = match config.node.mode {
            RoutingMode::Local => local.clone(),
            RoutingMode::Hybrid => {
                let transport = GuardedTransport::new(
                    Arc::new(UnreachableTransport),
                    config.simulation.remote.clone(),
                );
                Arc::new(HybridSimulationConnector::new(local.clone(), Arc::new(transport)))
            }
        };

        Self {
            config,
            local,
            service,
            scenes,
        }
    }

    /// The router the rest of the node calls.
    pub fn service(&self) -> &Arc<dyn SimulationService> {
        &self.service
    }

    /// Regions actually hosted.
    pub fn scenes(&self) -> &[Arc<BasicScene>] {
        &self.scenes
    }

    /// Runs until a shutdown signal arrives, then shuts down gracefully.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting grid node {}", self.config.node.name);
        self.log_configuration_summary();

        let monitoring_handle = (self.config.node.stats_interval_secs > 0).then(|| {
            let stats = self.local.stats().clone();
            let period = tokio::time::Duration::from_secs(self.config.node.stats_interval_secs);
            tokio::spawn(report_statistics(stats, period))
        });

        info!("✅ Grid node is now running with {} hosted regions", self.scenes.len());
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown_signal().await?;

        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        if let Some(handle) = monitoring_handle {
            handle.abort();
        }

        self.shutdown();
        log_final_statistics(self.local.stats());

        info!("✅ Grid node shutdown complete");
        Ok(())
    }

    /// Stops admitting agents and unregisters every hosted region.
    ///
    /// Unregister failures are logged and do not interrupt the sequence.
    pub fn shutdown(&self) {
        info!("🧹 Unregistering {} hosted regions...", self.scenes.len());
        for scene in &self.scenes {
            scene.begin_shutdown();
            let _ = self.local.remove_region(scene.region_info().region_id);
        }
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🏷️ Node: {}", self.config.node.name);
        info!("  🔀 Routing mode: {}", self.config.node.mode);
        info!(
            "  📐 Variable-size regions need: {}",
            self.config.simulation.min_variable_region_version
        );
        info!("  ⏱️ Remote timeout: {}ms", self.config.simulation.remote.timeout_ms);
        for scene in &self.scenes {
            let info = scene.region_info();
            info!(
                "  🗺️ {} ({}) at {},{} size {}x{}",
                info.region_name,
                info.region_id,
                info.grid_x,
                info.grid_y,
                info.size_x,
                info.size_y
            );
        }
    }
}

async fn report_statistics(stats: Arc<RoutingStats>, period: tokio::time::Duration) {
    let mut interval = tokio::time::interval(period);
    let mut last = stats.snapshot();

    loop {
        interval.tick().await;

        let now = stats.snapshot();
        info!(
            "📊 Routing - {} local | {} remote | {} rejected | {} broadcasts this period",
            now.local_dispatches - last.local_dispatches,
            now.remote_dispatches - last.remote_dispatches,
            now.rejected - last.rejected,
            now.broadcasts - last.broadcasts
        );
        last = now;
    }
}

fn log_final_statistics(stats: &RoutingStats) {
    let totals = stats.snapshot();
    info!("📊 Final Statistics:");
    info!("  - Local dispatches: {}", totals.local_dispatches);
    info!("  - Remote dispatches: {}", totals.remote_dispatches);
    info!("  - Rejected calls: {}", totals.rejected);
    info!("  - Position broadcasts: {}", totals.broadcasts);
}
