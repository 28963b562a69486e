//! Simulation service configuration types and defaults.

use grid_types::{ProtocolVersion, MIN_VARIABLE_REGION_VERSION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the routing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Callers below this protocol version are refused access to regions
    /// that are not the standard size
    #[serde(default = "default_min_variable_region_version")]
    pub min_variable_region_version: ProtocolVersion,

    /// Policy applied to calls leaving this node
    #[serde(default)]
    pub remote: RemoteSettings,
}

/// Timeout and failure isolation for the remote transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Closed breakers untouched for this long are forgotten, in milliseconds
    #[serde(default = "default_endpoint_idle_ms")]
    pub endpoint_idle_ms: u64,

    /// Per-endpoint circuit breaker
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is let through,
    /// in milliseconds
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,
    /// Number of successful trial calls needed to close the circuit again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_min_variable_region_version() -> ProtocolVersion {
    MIN_VARIABLE_REGION_VERSION
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_endpoint_idle_ms() -> u64 {
    600_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_duration_ms() -> u64 {
    60_000
}

fn default_success_threshold() -> u32 {
    1
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn endpoint_idle(&self) -> Duration {
        Duration::from_millis(self.endpoint_idle_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_variable_region_version: default_min_variable_region_version(),
            remote: RemoteSettings::default(),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            endpoint_idle_ms: default_endpoint_idle_ms(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_ms: default_open_duration_ms(),
            success_threshold: default_success_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.min_variable_region_version, MIN_VARIABLE_REGION_VERSION);
        assert_eq!(config.remote.timeout(), Duration::from_secs(30));
        assert_eq!(config.remote.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "min_variable_region_version": "SIMULATION/0.4",
            "remote": { "timeout_ms": 500 }
        }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.min_variable_region_version, ProtocolVersion::new(0, 4));
        assert_eq!(config.remote.timeout_ms, 500);
        assert_eq!(config.remote.endpoint_idle(), Duration::from_secs(600));
        assert_eq!(config.remote.circuit_breaker, CircuitBreakerConfig::default());
    }
}
