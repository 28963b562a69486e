//! The capability set a locally hosted simulation instance exposes to the router.
//!
//! The router only ever talks to a hosted region through [`SceneHandle`]; it
//! does not know the instance's concrete type. Each method is the
//! destination-side entry point of one routed operation and performs the
//! instance's own checks (ban lists, capacity, auth tokens).

use crate::error::SceneError;
use async_trait::async_trait;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
    RegionId, RegionInfo, SceneObject, TeleportFlags, Vector3,
};
use std::sync::Arc;
use uuid::Uuid;

pub mod basic;

pub use basic::BasicScene;

/// Entry points of a locally hosted region.
#[async_trait]
pub trait SceneHandle: Send + Sync {
    /// The region's own descriptor.
    fn region_info(&self) -> &RegionInfo;

    fn region_id(&self) -> RegionId {
        self.region_info().region_id
    }

    /// Accepts a new agent session. This is the only call that creates one.
    async fn new_user_connection(
        &self,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        source: Option<&GridRegion>,
    ) -> Result<(), SceneError>;

    /// Applies a full-state update to an existing session.
    async fn incoming_update_agent(&self, data: &AgentData, ctx: &EntityTransferContext) -> bool;

    /// Applies a position update if this scene holds a matching presence.
    ///
    /// Returns whether a presence matched.
    async fn incoming_update_agent_position(&self, position: &AgentPosition) -> bool;

    /// Admission check performed before a session is created.
    async fn query_access(
        &self,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
    ) -> Result<(), SceneError>;

    /// The agent arrived elsewhere; drop origin-side bookkeeping.
    async fn incoming_release_agent(&self, agent_id: AgentId) -> bool;

    /// Tears down a session. Unknown agents are not an error.
    async fn incoming_close_agent(&self, agent_id: AgentId, auth_token: &str) -> bool;

    /// Inserts an object the scene now owns.
    async fn incoming_create_object(&self, position: Vector3, object: Arc<SceneObject>) -> bool;
}
