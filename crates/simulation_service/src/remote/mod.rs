//! Remote transport contract.
//!
//! A [`RemoteTransport`] performs the routed operations against a region
//! hosted by another node. The wire format is the implementation's business;
//! the router only relies on failures coming back as `false` or as a
//! [`SimulationError`], never as a panic. Timeouts are ordinary failures.
//!
//! * [`UnreachableTransport`] - used when the node has no network transport
//! * [`GuardedTransport`] - wraps any transport with a per-call timeout and a
//!   per-endpoint circuit breaker

use crate::error::SimulationError;
use async_trait::async_trait;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, EntityTransferContext, GridRegion, ObjectHandoff,
    RegionId, TeleportFlags, Vector3,
};
use tracing::debug;
use uuid::Uuid;

pub mod circuit_breaker;
pub mod guarded;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use guarded::GuardedTransport;

/// Network implementation of the routed operations.
///
/// Position-only updates are never forwarded off-node, so they are not part
/// of this contract.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: &GridRegion,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError>;

    async fn update_agent(
        &self,
        destination: &GridRegion,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> bool;

    #[allow(clippy::too_many_arguments)]
    async fn query_access(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError>;

    /// `uri` is where the origin region can be reached.
    async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool;

    async fn close_agent(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        auth_token: &str,
    ) -> bool;

    async fn create_object(
        &self,
        destination: &GridRegion,
        position: Vector3,
        object: ObjectHandoff,
    ) -> bool;
}

/// Transport for nodes that are not connected to a grid.
///
/// Every call fails with a displayable reason.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnreachableTransport;

impl UnreachableTransport {
    const REASON: &'static str =
        "Destination is not hosted here and no remote transport is configured";
}

#[async_trait]
impl RemoteTransport for UnreachableTransport {
    async fn create_agent(
        &self,
        _source: Option<&GridRegion>,
        destination: &GridRegion,
        circuit: &AgentCircuitData,
        _teleport_flags: TeleportFlags,
        _ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        debug!(
            "No remote transport for agent {} to {} ({})",
            circuit.agent_id, destination.region_name, destination.region_id
        );
        Err(SimulationError::Remote(Self::REASON.to_string()))
    }

    async fn update_agent(
        &self,
        _destination: &GridRegion,
        _data: &AgentData,
        _ctx: &EntityTransferContext,
    ) -> bool {
        false
    }

    async fn query_access(
        &self,
        _destination: &GridRegion,
        _agent_id: AgentId,
        _agent_home_uri: &str,
        _via_teleport: bool,
        _position: Vector3,
        _features: &[Uuid],
        _ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        Err(SimulationError::Remote(Self::REASON.to_string()))
    }

    async fn release_agent(&self, _origin_id: RegionId, _agent_id: AgentId, _uri: &str) -> bool {
        false
    }

    async fn close_agent(
        &self,
        _destination: &GridRegion,
        _agent_id: AgentId,
        _auth_token: &str,
    ) -> bool {
        false
    }

    async fn create_object(
        &self,
        _destination: &GridRegion,
        _position: Vector3,
        _object: ObjectHandoff,
    ) -> bool {
        false
    }
}
