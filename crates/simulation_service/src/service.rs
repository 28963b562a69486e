//! The simulation service contract.
//!
//! This is what teleport orchestration and region-crossing logic call. Both
//! routers implement it: [`LocalSimulationConnector`](crate::LocalSimulationConnector)
//! only reaches regions hosted by this process, while
//! [`HybridSimulationConnector`](crate::HybridSimulationConnector) falls back
//! to the remote transport for everything else.
//!
//! # Call ordering
//!
//! For one agent, callers issue `query_access` before `create_agent`, and
//! `create_agent` before any update, release or close for that session. The
//! service executes whatever it is asked and does not enforce this sequence.

use crate::error::SimulationError;
use async_trait::async_trait;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
    ObjectHandoff, RegionId, TeleportFlags, Vector3,
};
use uuid::Uuid;

/// Hand-off operations between regions.
///
/// A `None` destination fails immediately without touching any region.
#[async_trait]
pub trait SimulationService: Send + Sync {
    /// Creates an agent session at `destination`.
    ///
    /// `source` is `None` for agents arriving from login.
    async fn create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: Option<&GridRegion>,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError>;

    /// Pushes an agent's full authoritative state to `destination`.
    async fn update_agent(
        &self,
        destination: Option<&GridRegion>,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> bool;

    /// Offers a position update to every locally hosted scene.
    ///
    /// Never leaves this node. Returns `true` once every local scene has
    /// been offered the update, whether or not any of them matched.
    async fn update_agent_position(
        &self,
        destination: Option<&GridRegion>,
        position: &AgentPosition,
    ) -> bool;

    /// Pre-flight compatibility and admission check, issued before `create_agent`.
    #[allow(clippy::too_many_arguments)]
    async fn query_access(
        &self,
        destination: Option<&GridRegion>,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError>;

    /// Tells the origin region the agent has fully arrived elsewhere.
    ///
    /// A zero `origin_id` fails immediately.
    async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool;

    /// Tears down a session at `destination`.
    async fn close_agent(
        &self,
        destination: Option<&GridRegion>,
        agent_id: AgentId,
        auth_token: &str,
    ) -> bool;

    /// Hands an object to `destination`.
    async fn create_object(
        &self,
        destination: Option<&GridRegion>,
        position: Vector3,
        object: ObjectHandoff,
    ) -> bool;

    /// Returns `true` if `region_id` is hosted by this process.
    fn is_local_region(&self, region_id: RegionId) -> bool;

    /// The local-only view of this service, bypassing any network fallback.
    fn inner_service(&self) -> &dyn SimulationService;
}
