//! # Simulation Service - Region Hand-off Routing
//!
//! Routing layer that moves live agent sessions and in-world objects between
//! regions. For every hand-off it decides whether the destination region is
//! hosted by this process (direct call into the hosted instance) or by
//! another node (remote transport).
//!
//! ## Architecture Overview
//!
//! * **[`LocalRegistry`]** - concurrent map from region id to the hosted
//!   instance's [`SceneHandle`]
//! * **[`LocalSimulationConnector`]** - executes hand-offs against hosted
//!   regions only, never performs network I/O
//! * **[`RemoteTransport`]** - contract for reaching regions on other nodes;
//!   [`GuardedTransport`] adds timeouts and per-endpoint circuit breakers
//! * **[`HybridSimulationConnector`]** - the entry point callers use: local
//!   first, remote only when the destination is not hosted here
//!
//! Both routers implement [`SimulationService`].
//!
//! ### Routing Rules
//!
//! 1. A missing destination fails with "destination unknown" before anything
//!    is called
//! 2. A destination hosted here is handled locally and that result is final
//! 3. Any other destination is handed to the remote transport exactly once
//! 4. Position-only updates are offered to every hosted scene and never leave
//!    the node
//!
//! ```rust
//! use grid_types::{
//!     AgentCircuitData, AgentId, EntityTransferContext, GridRegion, RegionId, RegionInfo,
//!     TeleportFlags,
//! };
//! use simulation_service::{
//!     BasicScene, HybridSimulationConnector, LocalSimulationConnector, ServiceConfig,
//!     SimulationService, UnreachableTransport,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let local = Arc::new(LocalSimulationConnector::new(ServiceConfig::default()));
//! let info = RegionInfo::new(RegionId::new(), "Welcome Island", 1000, 1000);
//! let destination = GridRegion::try_from(&info).unwrap();
//! local.add_region(Arc::new(BasicScene::new(info))).unwrap();
//!
//! let router = HybridSimulationConnector::new(local, Arc::new(UnreachableTransport));
//! let circuit = AgentCircuitData::new(AgentId::new(), "Ada", "Lovelace");
//! let ctx = EntityTransferContext::default();
//! let result = router
//!     .create_agent(None, Some(&destination), &circuit, TeleportFlags::VIA_LOGIN, &ctx)
//!     .await;
//! assert!(result.is_ok());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! No routed operation panics or aborts across the routing boundary. Failures
//! come back as `false` or as a [`SimulationError`] whose text is the reason
//! shown to the user. Panics inside a hosted instance are caught by the local
//! router and reported as [`SimulationError::SceneFault`].

pub use config::{CircuitBreakerConfig, RemoteSettings, ServiceConfig};
pub use error::{RegistryError, SceneError, SimulationError};
pub use hybrid::HybridSimulationConnector;
pub use local::{LocalOutcome, LocalSimulationConnector};
pub use registry::LocalRegistry;
pub use remote::{
    CircuitBreaker, CircuitBreakerState, GuardedTransport, RemoteTransport, UnreachableTransport,
};
pub use scene::{BasicScene, SceneHandle};
pub use service::SimulationService;
pub use stats::{RoutingStats, RoutingStatsSnapshot};

pub mod config;
pub mod error;
pub mod hybrid;
pub mod local;
pub mod registry;
pub mod remote;
pub mod scene;
pub mod service;
pub mod stats;

mod tests;
