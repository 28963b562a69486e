//! Local router: executes hand-off operations against regions hosted by this
//! process, without any network I/O.
//!
//! Every routed call resolves its destination in the [`LocalRegistry`] exactly
//! once and reports a [`LocalOutcome`]. `Handled` means the local path ran and
//! its result (success or refusal) is final. `NotLocal` means the destination
//! is hosted elsewhere and nothing was executed.
//!
//! Hosted instances are called through [`SceneHandle`] only. A panic inside a
//! hosted instance is caught here and turned into a failure result; it never
//! unwinds into the caller.

use crate::config::ServiceConfig;
use crate::error::{RegistryError, SimulationError};
use crate::registry::LocalRegistry;
use crate::scene::SceneHandle;
use crate::service::SimulationService;
use crate::stats::RoutingStats;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
    ObjectHandoff, RegionId, TeleportFlags, Vector3,
};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Result of attempting an operation on the local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOutcome<T> {
    /// The destination is hosted here and the operation ran
    Handled(T),
    /// The destination is not hosted here; nothing was executed
    NotLocal,
}

impl<T> LocalOutcome<T> {
    pub fn is_handled(&self) -> bool {
        matches!(self, LocalOutcome::Handled(_))
    }

    /// The local result, if the local path ran.
    pub fn handled(self) -> Option<T> {
        match self {
            LocalOutcome::Handled(value) => Some(value),
            LocalOutcome::NotLocal => None,
        }
    }
}

/// Router over the regions hosted by this process.
#[derive(Debug)]
pub struct LocalSimulationConnector {
    registry: Arc<LocalRegistry>,
    config: ServiceConfig,
    stats: Arc<RoutingStats>,
}

impl LocalSimulationConnector {
    /// Creates a router with an empty registry.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_registry(Arc::new(LocalRegistry::new()), config)
    }

    /// Creates a router over an existing registry.
    pub fn with_registry(registry: Arc<LocalRegistry>, config: ServiceConfig) -> Self {
        Self {
            registry,
            config,
            stats: Arc::new(RoutingStats::new()),
        }
    }

    pub fn registry(&self) -> &Arc<LocalRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Routing counters, shared with any hybrid router built on top.
    pub fn stats(&self) -> &Arc<RoutingStats> {
        &self.stats
    }

    /// Starts routing to a newly hosted region.
    ///
    /// A double registration is reported and the existing region stays in
    /// place. Callers log and carry on; it must not abort startup.
    pub fn add_region(&self, scene: Arc<dyn SceneHandle>) -> Result<(), RegistryError> {
        let region_id = scene.region_id();
        let region_name = scene.region_info().region_name.clone();
        match self.registry.register(region_id, scene) {
            Ok(()) => {
                info!("🗺️ Hosting region {} ({})", region_name, region_id);
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ Could not host region {} ({}): {}", region_name, region_id, e);
                Err(e)
            }
        }
    }

    /// Stops routing to a hosted region.
    ///
    /// Removing a region that is not hosted is reported but harmless; it
    /// happens during shutdown races.
    pub fn remove_region(
        &self,
        region_id: RegionId,
    ) -> Result<Arc<dyn SceneHandle>, RegistryError> {
        match self.registry.unregister(region_id) {
            Ok(scene) => {
                info!(
                    "🗺️ Stopped hosting region {} ({})",
                    scene.region_info().region_name,
                    region_id
                );
                Ok(scene)
            }
            Err(e) => {
                warn!("⚠️ {}", e);
                Err(e)
            }
        }
    }

    fn resolve(&self, region_id: RegionId) -> Option<Arc<dyn SceneHandle>> {
        let scene = self.registry.get(region_id);
        if scene.is_some() {
            self.stats.record_local();
        }
        scene
    }

    /// Local path of `create_agent`.
    pub async fn try_create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: &GridRegion,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        _ctx: &EntityTransferContext,
    ) -> LocalOutcome<Result<(), SimulationError>> {
        let Some(scene) = self.resolve(destination.region_id) else {
            return LocalOutcome::NotLocal;
        };

        debug!(
            "🧍 Creating agent {} ({}) in {}",
            circuit.agent_id,
            circuit.full_name(),
            destination.region_name
        );
        let call = scene.new_user_connection(circuit, teleport_flags, source);
        let result = match contain_panic(destination.region_id, "create_agent", call).await {
            Ok(result) => result.map_err(SimulationError::from),
            Err(fault) => Err(SimulationError::SceneFault(fault)),
        };
        if let Err(e) = &result {
            debug!(
                "🚫 Agent {} refused by {}: {}",
                circuit.agent_id, destination.region_name, e
            );
        }
        LocalOutcome::Handled(result)
    }

    /// Local path of the full-state `update_agent`.
    pub async fn try_update_agent(
        &self,
        destination: &GridRegion,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> LocalOutcome<bool> {
        let Some(scene) = self.resolve(destination.region_id) else {
            return LocalOutcome::NotLocal;
        };

        trace!("Updating agent {} in {}", data.agent_id, destination.region_name);
        let call = scene.incoming_update_agent(data, ctx);
        LocalOutcome::Handled(
            contain_panic(destination.region_id, "update_agent", call)
                .await
                .unwrap_or(false),
        )
    }

    /// Local path of `query_access`, including the variable-size gate.
    #[allow(clippy::too_many_arguments)]
    pub async fn try_query_access(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
        ctx: &EntityTransferContext,
    ) -> LocalOutcome<Result<(), SimulationError>> {
        let Some(scene) = self.resolve(destination.region_id) else {
            return LocalOutcome::NotLocal;
        };

        if ctx.outbound_version < self.config.min_variable_region_version
            && !destination.has_default_size()
        {
            debug!(
                "🚫 Refusing {} access to {}: {}x{} region, caller speaks {}",
                agent_id,
                destination.region_name,
                destination.region_size_x,
                destination.region_size_y,
                ctx.outbound_version
            );
            return LocalOutcome::Handled(Err(SimulationError::IncompatibleRegionSize));
        }

        let call = scene.query_access(agent_id, agent_home_uri, via_teleport, position, features);
        let result = match contain_panic(destination.region_id, "query_access", call).await {
            Ok(result) => result.map_err(SimulationError::from),
            Err(fault) => Err(SimulationError::SceneFault(fault)),
        };
        LocalOutcome::Handled(result)
    }

    /// Local path of `release_agent`. `origin_id` is the region to release from.
    pub async fn try_release_agent(
        &self,
        origin_id: RegionId,
        agent_id: AgentId,
        _uri: &str,
    ) -> LocalOutcome<bool> {
        let Some(scene) = self.resolve(origin_id) else {
            return LocalOutcome::NotLocal;
        };

        trace!("Releasing agent {} from {}", agent_id, origin_id);
        let call = scene.incoming_release_agent(agent_id);
        LocalOutcome::Handled(
            contain_panic(origin_id, "release_agent", call)
                .await
                .unwrap_or(false),
        )
    }

    /// Local path of `close_agent`.
    pub async fn try_close_agent(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        auth_token: &str,
    ) -> LocalOutcome<bool> {
        let Some(scene) = self.resolve(destination.region_id) else {
            return LocalOutcome::NotLocal;
        };

        debug!("👋 Closing agent {} in {}", agent_id, destination.region_name);
        let call = scene.incoming_close_agent(agent_id, auth_token);
        LocalOutcome::Handled(
            contain_panic(destination.region_id, "close_agent", call)
                .await
                .unwrap_or(false),
        )
    }

    /// Local path of `create_object`.
    ///
    /// A [`ObjectHandoff::Local`] object is deep-copied before insertion so the
    /// source scene keeps sole ownership of the original. A
    /// [`ObjectHandoff::Remote`] object is adopted as is.
    pub async fn try_create_object(
        &self,
        destination: &GridRegion,
        position: Vector3,
        object: &ObjectHandoff,
    ) -> LocalOutcome<bool> {
        let Some(scene) = self.resolve(destination.region_id) else {
            return LocalOutcome::NotLocal;
        };

        debug!(
            "📦 Handing object {} to {} ({})",
            object.object().id,
            destination.region_name,
            if object.is_local() { "copy" } else { "adopt" }
        );
        let destination_object = object.clone().into_destination_object();
        let call = scene.incoming_create_object(position, destination_object);
        LocalOutcome::Handled(
            contain_panic(destination.region_id, "create_object", call)
                .await
                .unwrap_or(false),
        )
    }

    /// Offers a position update to every hosted scene.
    ///
    /// Deliveries run concurrently against a snapshot of the registry. Each
    /// scene decides on its own whether it holds the presence.
    pub async fn broadcast_agent_position(&self, position: &AgentPosition) -> bool {
        self.stats.record_broadcast();
        let scenes = self.registry.scenes();

        let deliveries = scenes.iter().map(|scene| {
            let region_id = scene.region_id();
            let call = scene.incoming_update_agent_position(position);
            async move {
                contain_panic(region_id, "update_agent_position", call)
                    .await
                    .unwrap_or(false)
            }
        });
        let matched = join_all(deliveries).await.into_iter().filter(|m| *m).count();

        trace!(
            "Position of agent {} offered to {} scenes, {} matched",
            position.agent_id,
            scenes.len(),
            matched
        );
        true
    }
}

/// Awaits a hosted-instance call, converting a panic into its message.
pub(crate) async fn contain_panic<T, F>(
    region_id: RegionId,
    operation: &'static str,
    call: F,
) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(call).catch_unwind().await.map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!("❌ Region {} panicked during {}: {}", region_id, operation, message);
        message
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl SimulationService for LocalSimulationConnector {
    async fn create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: Option<&GridRegion>,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        let Some(destination) = destination else {
            self.stats.record_rejected();
            return Err(SimulationError::DestinationUnknown);
        };
        match self.try_create_agent(source, destination, circuit, teleport_flags, ctx).await {
            LocalOutcome::Handled(result) => result,
            LocalOutcome::NotLocal => Err(SimulationError::RegionNotFound(destination.region_id)),
        }
    }

    async fn update_agent(
        &self,
        destination: Option<&GridRegion>,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> bool {
        let Some(destination) = destination else {
            self.stats.record_rejected();
            return false;
        };
        self.try_update_agent(destination, data, ctx)
            .await
            .handled()
            .unwrap_or(false)
    }

    async fn update_agent_position(
        &self,
        destination: Option<&GridRegion>,
        position: &AgentPosition,
    ) -> bool {
        if destination.is_none() {
            self.stats.record_rejected();
            return false;
        }
        self.broadcast_agent_position(position).await
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
            self.stats.record_rejected();
            return Err(SimulationError::DestinationUnknown);
        };
        let outcome = self
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
        match outcome {
            LocalOutcome::Handled(result) => result,
            LocalOutcome::NotLocal => Err(SimulationError::RegionNotFound(destination.region_id)),
        }
    }

    async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool {
        if origin_id.is_zero() {
            self.stats.record_rejected();
            return false;
        }
        self.try_release_agent(origin_id, agent_id, uri)
            .await
            .handled()
            .unwrap_or(false)
    }

    async fn close_agent(
        &self,
        destination: Option<&GridRegion>,
        agent_id: AgentId,
        auth_token: &str,
    ) -> bool {
        let Some(destination) = destination else {
            self.stats.record_rejected();
            return false;
        };
        self.try_close_agent(destination, agent_id, auth_token)
            .await
            .handled()
            .unwrap_or(false)
    }

    async fn create_object(
        &self,
        destination: Option<&GridRegion>,
        position: Vector3,
        object: ObjectHandoff,
    ) -> bool {
        let Some(destination) = destination else {
            self.stats.record_rejected();
            return false;
        };
        self.try_create_object(destination, position, &object)
            .await
            .handled()
            .unwrap_or(false)
    }

    fn is_local_region(&self, region_id: RegionId) -> bool {
        self.registry.contains(region_id)
    }

    fn inner_service(&self) -> &dyn SimulationService {
        self
    }
}
