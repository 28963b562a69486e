//! Agent hand-off payloads.
//!
//! These are the bodies carried by the session operations of the simulation
//! service. The routing layer never interprets them; it hands them to the
//! destination scene or to a remote transport untouched.

use crate::types::{AgentId, RegionId, Vector3};
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use uuid::Uuid;

bitflags! {
    /// How an agent arrives at a destination.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TeleportFlags: u32 {
        const SET_HOME_TO_TARGET = 1 << 0;
        const SET_LAST_TO_TARGET = 1 << 1;
        const VIA_LURE = 1 << 2;
        const VIA_LANDMARK = 1 << 3;
        const VIA_LOCATION = 1 << 4;
        const VIA_HOME = 1 << 5;
        const VIA_TELEHUB = 1 << 6;
        const VIA_LOGIN = 1 << 7;
        const VIA_GODLIKE_LURE = 1 << 8;
        const GODLIKE = 1 << 9;
        const NINE_ONE_ONE = 1 << 10;
        const DISABLE_CANCEL = 1 << 11;
        const VIA_REGION_ID = 1 << 12;
        const IS_FLYING = 1 << 13;
        const RESET_HOME = 1 << 14;
        const FORCE_REDIRECT = 1 << 15;
    }
}

impl Serialize for TeleportFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for TeleportFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

/// Circuit information used to create a session at a destination region.
///
/// Produced by the region an agent is leaving (or by login) and consumed by
/// the destination's "accept new connection" entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCircuitData {
    pub agent_id: AgentId,
    pub session_id: Uuid,
    pub secure_session_id: Uuid,
    pub circuit_code: u32,
    pub first_name: String,
    pub last_name: String,
    pub start_pos: Vector3,
    /// `true` when the agent is only near the destination, not entering it
    pub child: bool,
    pub caps_path: String,
    pub service_session_id: String,
    #[serde(default)]
    pub service_urls: HashMap<String, String>,
    #[serde(default)]
    pub home_uri: Option<String>,
}

impl AgentCircuitData {
    /// Creates circuit data for a root agent with fresh session ids.
    pub fn new(
        agent_id: AgentId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            session_id: Uuid::new_v4(),
            secure_session_id: Uuid::new_v4(),
            circuit_code: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            start_pos: Vector3::new(128.0, 128.0, 25.0),
            child: false,
            caps_path: Uuid::new_v4().simple().to_string(),
            service_session_id: String::new(),
            service_urls: HashMap::new(),
            home_uri: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Full authoritative state of an agent, pushed to a region it is crossing into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentData {
    pub agent_id: AgentId,
    pub region_id: RegionId,
    pub session_id: Uuid,
    pub position: Vector3,
    pub velocity: Vector3,
    pub center: Vector3,
    pub size: Vector3,
    pub at_axis: Vector3,
    pub left_axis: Vector3,
    pub up_axis: Vector3,
    /// Draw distance
    pub far: f32,
    pub throttles: Vec<u8>,
    pub control_flags: u32,
    pub god_level: u8,
    pub always_run: bool,
    /// Where the destination reports back once the agent has fully arrived
    #[serde(default)]
    pub callback_uri: Option<String>,
}

impl AgentData {
    pub fn new(
        agent_id: AgentId,
        region_id: RegionId,
        session_id: Uuid,
        position: Vector3,
    ) -> Self {
        Self {
            agent_id,
            region_id,
            session_id,
            position,
            velocity: Vector3::ZERO,
            center: position,
            size: Vector3::new(0.45, 0.6, 1.9),
            at_axis: Vector3::new(1.0, 0.0, 0.0),
            left_axis: Vector3::new(0.0, 1.0, 0.0),
            up_axis: Vector3::new(0.0, 0.0, 1.0),
            far: 64.0,
            throttles: Vec::new(),
            control_flags: 0,
            god_level: 0,
            always_run: false,
            callback_uri: None,
        }
    }
}

/// Lightweight position update for an agent.
///
/// The sender does not know which scene holds the matching presence, so this
/// payload is offered to every locally hosted scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPosition {
    pub agent_id: AgentId,
    pub session_id: Uuid,
    pub region_handle: u64,
    pub position: Vector3,
    pub velocity: Vector3,
    pub center: Vector3,
    pub size: Vector3,
    pub at_axis: Vector3,
    pub left_axis: Vector3,
    pub up_axis: Vector3,
    pub far: f32,
    pub change_region: bool,
    pub throttles: Vec<u8>,
}

impl AgentPosition {
    pub fn new(agent_id: AgentId, session_id: Uuid, region_handle: u64, position: Vector3) -> Self {
        Self {
            agent_id,
            session_id,
            region_handle,
            position,
            velocity: Vector3::ZERO,
            center: position,
            size: Vector3::new(0.45, 0.6, 1.9),
            at_axis: Vector3::new(1.0, 0.0, 0.0),
            left_axis: Vector3::new(0.0, 1.0, 0.0),
            up_axis: Vector3::new(0.0, 0.0, 1.0),
            far: 64.0,
            change_region: false,
            throttles: Vec::new(),
        }
    }
}
