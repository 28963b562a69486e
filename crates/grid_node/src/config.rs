//! Configuration management for a grid node.
//!
//! This module handles loading and validation of the node configuration from
//! TOML files, and conversion of configured regions into hosted region
//! descriptors.

use grid_types::{AgentId, RegionId, RegionInfo, MAX_GRID_COORD, REGION_SIZE};
use serde::{Deserialize, Serialize};
use simulation_service::ServiceConfig;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Errors raised while loading or validating the node configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_region_size() -> u32 {
    REGION_SIZE
}

fn default_external_host_name() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    9000
}

fn default_internal_address() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_access() -> u8 {
    13
}

fn default_max_agents() -> usize {
    100
}

/// How the node reaches regions it does not host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Hosted regions only; everything else is "region not found"
    Local,
    /// Hosted regions first, remote transport for the rest
    #[default]
    Hybrid,
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(RoutingMode::Local),
            "hybrid" => Ok(RoutingMode::Hybrid),
            other => Err(format!("Unknown routing mode: {other} (expected local or hybrid)")),
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Local => write!(f, "local"),
            RoutingMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Node configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Node identity and routing mode
    pub node: NodeSettings,
    /// Routing layer settings
    #[serde(default)]
    pub simulation: ServiceConfig,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Regions hosted by this node
    #[serde(default)]
    pub regions: Vec<RegionSettings>,
}

/// Node-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Name shown in logs
    pub name: String,
    #[serde(default)]
    pub mode: RoutingMode,
    /// Seconds between routing statistics reports (0 disables them)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

/// A region hosted by this node.
///
/// The grid location is in region-grid units and sizes are in length units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    pub name: String,
    pub uuid: RegionId,
    pub grid_x: u32,
    pub grid_y: u32,
    #[serde(default = "default_region_size")]
    pub size_x: u32,
    #[serde(default = "default_region_size")]
    pub size_y: u32,
    #[serde(default = "default_external_host_name")]
    pub external_host_name: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Node-internal listening address
    #[serde(default = "default_internal_address")]
    pub internal_address: String,
    /// Explicit server URI, overriding the host and port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uri: Option<String>,
    /// Access byte (13 general, 21 mature, 42 adult)
    #[serde(default = "default_access")]
    pub access: u8,
    #[serde(default)]
    pub region_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estate_owner: Option<Uuid>,
    /// Maximum number of agents, root and child
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    #[serde(default)]
    pub banned_agents: Vec<AgentId>,
}

impl RegionSettings {
    /// Creates a standard-sized region at the given grid cell.
    pub fn new(uuid: RegionId, name: impl Into<String>, grid_x: u32, grid_y: u32) -> Self {
        Self {
            name: name.into(),
            uuid,
            grid_x,
            grid_y,
            size_x: default_region_size(),
            size_y: default_region_size(),
            external_host_name: default_external_host_name(),
            http_port: default_http_port(),
            internal_address: default_internal_address(),
            server_uri: None,
            access: default_access(),
            region_secret: String::new(),
            estate_owner: None,
            max_agents: default_max_agents(),
            banned_agents: Vec::new(),
        }
    }

    /// Builds the hosted region's own descriptor.
    pub fn to_region_info(&self) -> Result<RegionInfo, ConfigError> {
        let internal_endpoint: SocketAddr = self.internal_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Region {}: invalid internal address {}",
                self.name, self.internal_address
            ))
        })?;

        let mut info = RegionInfo::new(self.uuid, self.name.clone(), self.grid_x, self.grid_y);
        info.size_x = self.size_x;
        info.size_y = self.size_y;
        info.external_host_name = self.external_host_name.clone();
        info.http_port = self.http_port;
        info.internal_endpoint = internal_endpoint;
        info.access = self.access;
        info.region_secret = self.region_secret.clone();
        info.estate_owner = self.estate_owner.unwrap_or_else(Uuid::nil);
        info.server_uri = self.server_uri.clone();
        Ok(info)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "grid-node".to_string(),
                mode: RoutingMode::Hybrid,
                stats_interval_secs: default_stats_interval_secs(),
            },
            simulation: ServiceConfig::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            regions: vec![RegionSettings::new(RegionId::new(), "Welcome Island", 1000, 1000)],
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file does not exist, writes a default configuration there and
    /// returns it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// The loaded configuration, or a `ConfigError` if the file could not be
    /// read, parsed or created.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for correctness.
    ///
    /// Checks the node name, the log level and every hosted region: ids must
    /// be assigned and unique, names unique, grid cells on the grid, sizes
    /// non-zero multiples of the standard region size, and internal addresses
    /// parseable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.name.trim().is_empty() {
            return Err(ConfigError::Invalid("Node name cannot be empty".to_string()));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            )));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for region in &self.regions {
            if region.uuid.is_zero() {
                return Err(ConfigError::Invalid(format!("Region {} has no uuid", region.name)));
            }
            if !ids.insert(region.uuid) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate region uuid: {}",
                    region.uuid
                )));
            }
            if !names.insert(region.name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate region name: {}",
                    region.name
                )));
            }
            if region.grid_x > MAX_GRID_COORD || region.grid_y > MAX_GRID_COORD {
                return Err(ConfigError::Invalid(format!(
                    "Region {}: grid location {},{} exceeds {MAX_GRID_COORD}",
                    region.name, region.grid_x, region.grid_y
                )));
            }
            for (axis, size) in [("size_x", region.size_x), ("size_y", region.size_y)] {
                if size == 0 || size % REGION_SIZE != 0 {
                    return Err(ConfigError::Invalid(format!(
                        "Region {}: {axis} {size} is not a non-zero multiple of {REGION_SIZE}",
                        region.name
                    )));
                }
            }
            if region.internal_address.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::Invalid(format!(
                    "Region {}: invalid internal address {}",
                    region.name, region.internal_address
                )));
            }
        }

        Ok(())
    }
}
