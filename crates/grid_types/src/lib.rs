//! # Grid Types
//!
//! Shared descriptors for the grid simulation service: region identity and
//! addressing, agent hand-off payloads, protocol version negotiation and
//! scene objects moving between regions.
//!
//! ## Key Types
//!
//! - [`GridRegion`] - Addressable descriptor of a region, as returned by the grid directory
//! - [`RegionInfo`] - A locally hosted region's own descriptor
//! - [`EntityTransferContext`] - Protocol information of the node initiating a transfer
//! - [`AgentCircuitData`], [`AgentData`], [`AgentPosition`] - Agent hand-off payloads
//! - [`SceneObject`] and [`ObjectHandoff`] - Objects crossing into another region
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types keep region and agent ids apart
//! - **Identity over contents**: Two `GridRegion` values describe the same region
//!   only when they carry the same assigned id, regardless of stale fields
//! - **Serialization**: Every payload supports serde for transport implementations

pub mod agent;
pub mod object;
pub mod region;
pub mod transfer;
pub mod types;

pub use agent::{AgentCircuitData, AgentData, AgentPosition, TeleportFlags};
pub use object::{ObjectHandoff, SceneObject, ScenePart};
pub use region::{
    GridRegion, GridRegionError, Maturity, RegionFlags, RegionInfo, MAX_GRID_COORD, REGION_SIZE,
};
pub use transfer::{
    EntityTransferContext, ProtocolVersion, ProtocolVersionError, CURRENT_PROTOCOL_VERSION,
    MIN_VARIABLE_REGION_VERSION,
};
pub use types::{AgentId, RegionId, Vector3};
