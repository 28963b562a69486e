//! Core identifier and vector types.
//!
//! - [`RegionId`] - Unique identifier for a region, with an explicit "unassigned" zero value
//! - [`AgentId`] - Unique identifier for a connected user's session
//! - [`Vector3`] - Single-precision 3D vector used for positions and velocities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a region on the grid.
///
/// Unlike most ids in the system, a region id has a meaningful zero value:
/// [`RegionId::ZERO`] marks a descriptor that has not been assigned an
/// identity yet. Such descriptors never compare equal to anything (see
/// [`GridRegion`](crate::GridRegion)), so `Default` yields zero rather than a
/// random id.
///
/// # Examples
///
/// ```rust
/// use grid_types::RegionId;
///
/// let region_id = RegionId::new();
/// assert!(!region_id.is_zero());
/// assert!(RegionId::default().is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct RegionId(pub Uuid);

impl RegionId {
    /// The unassigned region identity.
    pub const ZERO: RegionId = RegionId(Uuid::nil());

    /// Creates a new random region ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `true` if this id has not been assigned.
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl std::str::FromStr for RegionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RegionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Unique identifier for an agent (a connected user's live session).
///
/// This is a wrapper around UUID so agent ids cannot be confused with
/// region or object ids in routing calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Creates a new random agent ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for AgentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a 3D vector with single-precision floating point components.
///
/// Positions inside a region are expressed in length units relative to the
/// region's south-west corner.
///
/// # Examples
///
/// ```rust
/// use grid_types::Vector3;
///
/// let landing_point = Vector3::new(128.0, 128.0, 25.0);
/// assert_eq!(landing_point.distance(Vector3::new(128.0, 128.0, 20.0)), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    /// Creates a new vector with the specified components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Calculates the Euclidean distance to another vector.
    pub fn distance(&self, other: Vector3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
