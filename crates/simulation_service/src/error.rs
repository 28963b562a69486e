//! Error types for the simulation service.
//!
//! Routed operations never panic or abort across the routing boundary. Every
//! failure ends up either as `false` or as a [`SimulationError`] whose
//! `Display` text is the reason shown to the end user (for example in a
//! teleport failure message).

use grid_types::RegionId;

/// Why a routed agent operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// No destination (or origin) descriptor was supplied by the caller
    #[error("destination unknown")]
    DestinationUnknown,

    /// The destination is not hosted by this process
    #[error("region not found")]
    RegionNotFound(RegionId),

    /// The calling node's protocol cannot handle the destination's size
    #[error("Destination is a variable-sized region, and source is an old simulator")]
    IncompatibleRegionSize,

    /// The destination's own admission logic said no
    #[error("{0}")]
    Refused(String),

    /// The remote transport failed (timeout, refused connection, bad response...)
    #[error("{0}")]
    Remote(String),

    /// The hosted simulation instance failed while handling the call
    #[error("destination region failed: {0}")]
    SceneFault(String),
}

impl SimulationError {
    /// The displayable reason for this failure.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Errors raised while adding or removing locally hosted regions.
///
/// These are reported to the operator; they never abort a startup or
/// shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Region {0} is already registered")]
    AlreadyRegistered(RegionId),

    #[error("Region {0} is not registered")]
    NotRegistered(RegionId),

    #[error("Region has no assigned id")]
    UnassignedRegion,
}

/// Failure reported by a hosted simulation instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// Admission refused; the text is shown to the user
    #[error("{0}")]
    Refused(String),

    #[error("Region is shutting down")]
    ShuttingDown,
}

impl From<SceneError> for SimulationError {
    fn from(error: SceneError) -> Self {
        SimulationError::Refused(error.to_string())
    }
}
