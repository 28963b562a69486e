//! In-memory hosted region.
//!
//! `BasicScene` keeps just enough state to answer every routed operation:
//! a presence table, an object table, a ban list and an agent limit. The
//! node binary hosts its configured regions with it.

use super::SceneHandle;
use crate::error::SceneError;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use grid_types::{
    AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
    RegionInfo, SceneObject, TeleportFlags, Vector3,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An agent's presence in a scene.
#[derive(Debug, Clone)]
pub struct Presence {
    pub agent_id: AgentId,
    pub session_id: Uuid,
    pub name: String,
    pub position: Vector3,
    /// `true` while the agent is only near this region
    pub child: bool,
    /// Set once the agent arrived at another region and this one let go of it
    pub released: bool,
    pub last_update: Option<AgentData>,
}

/// An object placed in the scene together with its scene-scoped id.
#[derive(Debug, Clone)]
pub struct PlacedObject {
    pub object: Arc<SceneObject>,
    pub local_id: u32,
    pub position: Vector3,
}

/// Minimal hosted region backed by concurrent maps.
#[derive(Debug)]
pub struct BasicScene {
    info: RegionInfo,
    max_agents: usize,
    banned: DashSet<AgentId>,
    presences: DashMap<AgentId, Presence>,
    objects: DashMap<Uuid, PlacedObject>,
    next_local_id: AtomicU32,
    position_updates: AtomicU64,
    shutting_down: AtomicBool,
}

impl BasicScene {
    /// Creates an empty scene for the given region.
    pub fn new(info: RegionInfo) -> Self {
        Self {
            info,
            max_agents: 100,
            banned: DashSet::new(),
            presences: DashMap::new(),
            objects: DashMap::new(),
            next_local_id: AtomicU32::new(1),
            position_updates: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Sets the maximum number of presences (root and child).
    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    pub fn ban(&self, agent_id: AgentId) {
        self.banned.insert(agent_id);
    }

    /// Refuse new sessions from now on.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn presence(&self, agent_id: AgentId) -> Option<Presence> {
        self.presences.get(&agent_id).map(|p| p.clone())
    }

    pub fn presence_count(&self) -> usize {
        self.presences.len()
    }

    pub fn object(&self, object_id: Uuid) -> Option<PlacedObject> {
        self.objects.get(&object_id).map(|o| o.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of position updates that matched a presence here.
    pub fn position_updates_applied(&self) -> u64 {
        self.position_updates.load(Ordering::Relaxed)
    }

    fn admission_check(&self, agent_id: AgentId) -> Result<(), SceneError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SceneError::ShuttingDown);
        }
        if self.banned.contains(&agent_id) {
            return Err(SceneError::Refused(format!(
                "You are banned from {}",
                self.info.region_name
            )));
        }
        if !self.presences.contains_key(&agent_id) && self.presences.len() >= self.max_agents {
            return Err(SceneError::Refused(format!(
                "{} is full",
                self.info.region_name
            )));
        }
        Ok(())
    }

    fn contains_position(&self, position: Vector3) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.info.size_x as f32
            && position.y < self.info.size_y as f32
    }
}

#[async_trait]
impl SceneHandle for BasicScene {
    fn region_info(&self) -> &RegionInfo {
        &self.info
    }

    async fn new_user_connection(
        &self,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        source: Option<&GridRegion>,
    ) -> Result<(), SceneError> {
        self.admission_check(circuit.agent_id)?;

        let presence = Presence {
            agent_id: circuit.agent_id,
            session_id: circuit.session_id,
            name: circuit.full_name(),
            position: circuit.start_pos,
            child: circuit.child,
            released: false,
            last_update: None,
        };
        self.presences.insert(circuit.agent_id, presence);

        info!(
            "🧍 {} agent {} ({}) connected to {} from {} (flags {:?})",
            if circuit.child { "Child" } else { "Root" },
            circuit.full_name(),
            circuit.agent_id,
            self.info.region_name,
            source.map(|s| s.region_name.as_str()).unwrap_or("login"),
            teleport_flags
        );
        Ok(())
    }

    async fn incoming_update_agent(&self, data: &AgentData, _ctx: &EntityTransferContext) -> bool {
        match self.presences.get_mut(&data.agent_id) {
            Some(mut presence) => {
                presence.position = data.position;
                presence.last_update = Some(data.clone());
                true
            }
            None => {
                debug!(
                    "No presence for {} in {}, ignoring update",
                    data.agent_id, self.info.region_name
                );
                false
            }
        }
    }

    async fn incoming_update_agent_position(&self, position: &AgentPosition) -> bool {
        match self.presences.get_mut(&position.agent_id) {
            Some(mut presence) if presence.session_id == position.session_id => {
                presence.position = position.position;
                self.position_updates.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    async fn query_access(
        &self,
        agent_id: AgentId,
        _agent_home_uri: &str,
        _via_teleport: bool,
        position: Vector3,
        _features: &[Uuid],
    ) -> Result<(), SceneError> {
        self.admission_check(agent_id)?;
        if !self.contains_position(position) {
            return Err(SceneError::Refused(format!(
                "Position ({}, {}) is outside {}",
                position.x, position.y, self.info.region_name
            )));
        }
        Ok(())
    }

    async fn incoming_release_agent(&self, agent_id: AgentId) -> bool {
        match self.presences.get_mut(&agent_id) {
            Some(mut presence) => {
                presence.child = true;
                presence.released = true;
                debug!("Released agent {} from {}", agent_id, self.info.region_name);
                true
            }
            None => false,
        }
    }

    async fn incoming_close_agent(&self, agent_id: AgentId, auth_token: &str) -> bool {
        let Some(session_id) = self.presences.get(&agent_id).map(|p| p.session_id) else {
            debug!("Close for unknown agent {} in {}", agent_id, self.info.region_name);
            return true;
        };

        if session_id.to_string() != auth_token {
            warn!(
                "🚫 Refusing to close agent {} in {}: auth token mismatch",
                agent_id, self.info.region_name
            );
            return false;
        }

        self.presences.remove(&agent_id);
        info!("👋 Closed agent {} in {}", agent_id, self.info.region_name);
        true
    }

    async fn incoming_create_object(&self, position: Vector3, object: Arc<SceneObject>) -> bool {
        if self.objects.contains_key(&object.id) {
            warn!(
                "Object {} ({}) is already in {}",
                object.name, object.id, self.info.region_name
            );
            return false;
        }

        // The root takes the first id, parts follow
        let count = object.parts.len() as u32 + 1;
        let local_id = self.next_local_id.fetch_add(count, Ordering::Relaxed);
        debug!(
            "📦 Object {} entered {} as local id {}",
            object.name, self.info.region_name, local_id
        );
        self.objects.insert(
            object.id,
            PlacedObject {
                object,
                local_id,
                position,
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_types::RegionId;

    fn scene() -> BasicScene {
        BasicScene::new(RegionInfo::new(RegionId::new(), "Basic", 1000, 1000))
    }

    #[tokio::test]
    async fn test_connection_and_close() {
        let scene = scene();
        let circuit = AgentCircuitData::new(AgentId::new(), "Test", "User");
        scene
            .new_user_connection(&circuit, TeleportFlags::VIA_LOGIN, None)
            .await
            .unwrap();
        assert_eq!(scene.presence_count(), 1);

        assert!(!scene.incoming_close_agent(circuit.agent_id, "wrong-token").await);
        assert_eq!(scene.presence_count(), 1);

        let token = circuit.session_id.to_string();
        assert!(scene.incoming_close_agent(circuit.agent_id, &token).await);
        assert_eq!(scene.presence_count(), 0);

        // Closing again is harmless
        assert!(scene.incoming_close_agent(circuit.agent_id, &token).await);
    }

    #[tokio::test]
    async fn test_admission_refusals() {
        let scene = scene().with_max_agents(1);
        let banned = AgentId::new();
        scene.ban(banned);

        let err = scene
            .query_access(banned, "", true, Vector3::new(128.0, 128.0, 20.0), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("banned"));

        let first = AgentCircuitData::new(AgentId::new(), "First", "User");
        scene.new_user_connection(&first, TeleportFlags::empty(), None).await.unwrap();

        let second = AgentCircuitData::new(AgentId::new(), "Second", "User");
        let err = scene
            .new_user_connection(&second, TeleportFlags::empty(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("full"));

        // An agent already present is not counted twice
        scene.new_user_connection(&first, TeleportFlags::empty(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_access_checks_position() {
        let scene = scene();
        assert!(scene
            .query_access(AgentId::new(), "", false, Vector3::new(300.0, 10.0, 0.0), &[])
            .await
            .is_err());
        assert!(scene
            .query_access(AgentId::new(), "", false, Vector3::new(255.0, 10.0, 0.0), &[])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_sessions() {
        let scene = scene();
        scene.begin_shutdown();
        let circuit = AgentCircuitData::new(AgentId::new(), "Late", "User");
        assert_eq!(
            scene.new_user_connection(&circuit, TeleportFlags::empty(), None).await,
            Err(SceneError::ShuttingDown)
        );
    }

    #[tokio::test]
    async fn test_position_update_requires_matching_session() {
        let scene = scene();
        let circuit = AgentCircuitData::new(AgentId::new(), "Moving", "User");
        scene.new_user_connection(&circuit, TeleportFlags::empty(), None).await.unwrap();

        let target = Vector3::new(2.0, 3.0, 4.0);
        let stale = AgentPosition::new(circuit.agent_id, Uuid::new_v4(), 0, target);
        assert!(!scene.incoming_update_agent_position(&stale).await);

        let update = AgentPosition::new(circuit.agent_id, circuit.session_id, 0, target);
        assert!(scene.incoming_update_agent_position(&update).await);
        assert_eq!(scene.presence(circuit.agent_id).unwrap().position, target);
        assert_eq!(scene.position_updates_applied(), 1);
    }

    #[tokio::test]
    async fn test_release_marks_child() {
        let scene = scene();
        let circuit = AgentCircuitData::new(AgentId::new(), "Leaving", "User");
        scene.new_user_connection(&circuit, TeleportFlags::empty(), None).await.unwrap();

        assert!(scene.incoming_release_agent(circuit.agent_id).await);
        let presence = scene.presence(circuit.agent_id).unwrap();
        assert!(presence.child && presence.released);
        assert!(!scene.incoming_release_agent(AgentId::new()).await);
    }

    #[tokio::test]
    async fn test_objects_get_scene_local_ids() {
        let scene = scene();
        let object = Arc::new(SceneObject::new("Box", AgentId::new(), Vector3::ZERO));
        assert!(scene.incoming_create_object(Vector3::new(5.0, 5.0, 5.0), object.clone()).await);
        assert!(!scene.incoming_create_object(Vector3::ZERO, object.clone()).await);

        let placed = scene.object(object.id).unwrap();
        assert!(Arc::ptr_eq(&placed.object, &object));
        assert_eq!(placed.local_id, 1);
        assert_eq!(placed.position, Vector3::new(5.0, 5.0, 5.0));
    }
}
