//! Protocol version negotiation for entity transfers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Errors raised while parsing a [`ProtocolVersion`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolVersionError {
    #[error("Unknown protocol prefix: {0}")]
    UnknownPrefix(String),

    #[error("Malformed protocol version: {0}")]
    Malformed(String),
}

/// Version of the simulation hand-off protocol spoken by a node.
///
/// Versions are totally ordered by `(major, minor)` and serialize as their
/// `SIMULATION/major.minor` string.
///
/// # Examples
///
/// ```rust
/// use grid_types::ProtocolVersion;
///
/// let old: ProtocolVersion = "SIMULATION/0.2".parse()?;
/// let new: ProtocolVersion = "0.6".parse()?;
/// assert!(old < new);
/// assert_eq!(new.to_string(), "SIMULATION/0.6");
/// # Ok::<(), grid_types::ProtocolVersionError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    const PREFIX: &'static str = "SIMULATION/";

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

/// Oldest protocol that understands regions larger than [`REGION_SIZE`](crate::REGION_SIZE).
pub const MIN_VARIABLE_REGION_VERSION: ProtocolVersion = ProtocolVersion::new(0, 3);

/// Protocol spoken by this implementation.
pub const CURRENT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(0, 6);

impl Default for ProtocolVersion {
    fn default() -> Self {
        CURRENT_PROTOCOL_VERSION
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = ProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let number = match s.split_once('/') {
            Some((prefix, number)) => {
                if !prefix.eq_ignore_ascii_case(Self::PREFIX.trim_end_matches('/')) {
                    return Err(ProtocolVersionError::UnknownPrefix(prefix.to_string()));
                }
                number
            }
            None => s,
        };

        let (major, minor) = number
            .split_once('.')
            .ok_or_else(|| ProtocolVersionError::Malformed(s.to_string()))?;
        let major = major
            .parse()
            .map_err(|_| ProtocolVersionError::Malformed(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| ProtocolVersionError::Malformed(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}.{}", Self::PREFIX, self.major, self.minor)
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Protocol information of the node initiating a transfer.
///
/// Built by the caller before a hand-off sequence and left unchanged for
/// the duration of each operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityTransferContext {
    /// Version the calling node uses when talking to destinations
    pub outbound_version: ProtocolVersion,
    /// Version the calling node accepts from peers
    pub inbound_version: ProtocolVersion,
    /// Feature ids both sides agreed on
    #[serde(default)]
    pub negotiated_features: Vec<Uuid>,
}

impl EntityTransferContext {
    /// A context whose outbound and inbound versions are both `version`.
    pub fn with_version(version: ProtocolVersion) -> Self {
        Self {
            outbound_version: version,
            inbound_version: version,
            negotiated_features: Vec::new(),
        }
    }
}
