//! # Grid Node - Main Entry Point
//!
//! One simulator process on the grid. It hosts the regions listed in its
//! configuration and routes agent and object hand-offs through the
//! simulation service: directly for hosted regions, over the remote
//! transport for everything else.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! grid_node
//!
//! # Specify custom configuration
//! grid_node --config east.toml
//!
//! # Host regions without any remote fallback
//! grid_node --mode local --log-level debug
//!
//! # JSON logging for production
//! grid_node --json-logs
//! ```
//!
//! ## Configuration
//!
//! The node loads configuration from a TOML file (default: `grid_node.toml`).
//! If the file doesn't exist, a default configuration with one region is
//! created.
//!
//! ## Signal Handling
//!
//! The node shuts down gracefully on SIGINT (Ctrl+C) and SIGTERM (Unix). A
//! second signal exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

pub use config::{ConfigError, LoggingSettings, NodeSettings, RegionSettings, RoutingMode};

/// Runs the node until shutdown.
///
/// 1. Command-line argument parsing
/// 2. Configuration loading for the logging settings
/// 3. Logging system initialization
/// 4. Application creation and execution
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes first, so read the file once just for its settings
    let mut logging = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
