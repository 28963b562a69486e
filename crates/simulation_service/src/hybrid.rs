//! Hybrid router: the entry point the rest of the node calls.
//!
//! Every operation tries the local router first and only falls back to the
//! remote transport when the destination is not hosted by this process.

use crate::error::SimulationError;
use crate::local::{LocalOutcome, LocalSimulationConnector};
use crate::remote::RemoteTransport;
use crate::service::SimulationService;
use crate::stats::RoutingStats;
use async_trait::async_trait;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
    ObjectHandoff, RegionId, TeleportFlags, Vector3,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Local-first router with a remote fallback.
///
/// # Routing
///
/// For every call except the position-only update:
///
/// 1. A missing destination (or a zero origin for `release_agent`) fails
///    immediately with "destination unknown"
/// 2. The local router resolves the destination once
/// 3. If the destination is hosted here, the local result is final, refusals
///    included. The remote transport is never called for a local region
/// 4. Otherwise the call goes to the remote transport exactly once, with its
///    arguments unchanged
///
/// Position-only updates are broadcast to local scenes and never leave the
/// node.
pub struct HybridSimulationConnector {
    local: Arc<LocalSimulationConnector>,
    remote: Arc<dyn RemoteTransport>,
}

impl HybridSimulationConnector {
    pub fn new(local: Arc<LocalSimulationConnector>, remote: Arc<dyn RemoteTransport>) -> Self {
        Self { local, remote }
    }

    /// The local router alone, for callers that must bypass the network
    /// fallback.
    pub fn get_inner_service(&self) -> &Arc<LocalSimulationConnector> {
        &self.local
    }

    pub fn stats(&self) -> &Arc<RoutingStats> {
        self.local.stats()
    }

    fn reject(&self, operation: &str) {
        self.local.stats().record_rejected();
        debug!("🚫 {} without a destination", operation);
    }

    fn going_remote(&self, operation: &str, destination: &str) {
        self.local.stats().record_remote();
        trace!("🌐 {} for {} goes remote", operation, destination);
    }
}

impl std::fmt::Debug for HybridSimulationConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSimulationConnector")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SimulationService for HybridSimulationConnector {
    async fn create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: Option<&GridRegion>,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        let Some(destination) = destination else {
            self.reject("create_agent");
            return Err(SimulationError::DestinationUnknown);
        };

        if let LocalOutcome::Handled(result) = self
            .local
            .try_create_agent(source, destination, circuit, teleport_flags, ctx)
            .await
        {
            return result;
        }

        self.going_remote("create_agent", &destination.region_name);
        let result = self
            .remote
            .create_agent(source, destination, circuit, teleport_flags, ctx)
            .await;
        if let Err(e) = &result {
            warn!(
                "❌ Remote create_agent for {} at {} failed: {}",
                circuit.agent_id,
                destination.server_uri(),
                e
            );
        }
        result
    }

    async fn update_agent(
        &self,
        destination: Option<&GridRegion>,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> bool {
        let Some(destination) = destination else {
            self.reject("update_agent");
            return false;
        };

        let outcome = self.local.try_update_agent(destination, data, ctx).await;
        if let LocalOutcome::Handled(updated) = outcome {
            return updated;
        }

        self.going_remote("update_agent", &destination.region_name);
        self.remote.update_agent(destination, data, ctx).await
    }

    async fn update_agent_position(
        &self,
        destination: Option<&GridRegion>,
        position: &AgentPosition,
    ) -> bool {
        if destination.is_none() {
            self.reject("update_agent_position");
            return false;
        }
        self.local.broadcast_agent_position(position).await
    }

    async fn query_access(
        &self,
        destination: Option<&GridRegion>,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        let Some(destination) = destination else {
            self.reject("query_access");
            return Err(SimulationError::DestinationUnknown);
        };

        let outcome = self
            .local
            .try_query_access(
                destination,
                agent_id,
                agent_home_uri,
                via_teleport,
                position,
                features,
                ctx,
            )
            .await;
        if let LocalOutcome::Handled(result) = outcome {
            return result;
        }

        self.going_remote("query_access", &destination.region_name);
        self.remote
            .query_access(
                destination,
                agent_id,
                agent_home_uri,
                via_teleport,
                position,
                features,
                ctx,
            )
            .await
    }

    async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool {
        if origin_id.is_zero() {
            self.reject("release_agent");
            return false;
        }

        let outcome = self.local.try_release_agent(origin_id, agent_id, uri).await;
        if let LocalOutcome::Handled(released) = outcome {
            return released;
        }

        self.going_remote("release_agent", uri);
        self.remote.release_agent(origin_id, agent_id, uri).await
    }

    async fn close_agent(
        &self,
        destination: Option<&GridRegion>,
        agent_id: AgentId,
        auth_token: &str,
    ) -> bool {
        let Some(destination) = destination else {
            self.reject("close_agent");
            return false;
        };

        let outcome = self.local.try_close_agent(destination, agent_id, auth_token).await;
        if let LocalOutcome::Handled(closed) = outcome {
            return closed;
        }

        self.going_remote("close_agent", &destination.region_name);
        self.remote.close_agent(destination, agent_id, auth_token).await
    }

    async fn create_object(
        &self,
        destination: Option<&GridRegion>,
        position: Vector3,
        object: ObjectHandoff,
    ) -> bool {
        let Some(destination) = destination else {
            self.reject("create_object");
            return false;
        };

        let outcome = self.local.try_create_object(destination, position, &object).await;
        if let LocalOutcome::Handled(created) = outcome {
            return created;
        }

        self.going_remote("create_object", &destination.region_name);
        self.remote.create_object(destination, position, object).await
    }

    fn is_local_region(&self, region_id: RegionId) -> bool {
        self.local.is_local_region(region_id)
    }

    fn inner_service(&self) -> &dyn SimulationService {
        self.local.as_ref()
    }
}
