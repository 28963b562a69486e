//! Region descriptors and addressing.
//!
//! A [`GridRegion`] is what every routing decision is made on: it names a
//! region by id, says where it sits on the grid and how to reach the node
//! hosting it. Descriptors come either from the grid directory (see
//! [`GridRegion::from_key_value_pairs`]) or from a locally hosted region's own
//! [`RegionInfo`].

use crate::types::RegionId;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use uuid::Uuid;

/// Edge length of a standard region, in length units.
pub const REGION_SIZE: u32 = 256;

/// Largest grid coordinate whose absolute location still fits in a `u32`.
pub const MAX_GRID_COORD: u32 = u32::MAX / REGION_SIZE;

/// Errors raised while reading a region descriptor from directory data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridRegionError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidField { key: &'static str, value: String },

    #[error("Grid location {grid_x},{grid_y} is outside the grid")]
    LocationOutOfRange { grid_x: u32, grid_y: u32 },
}

/// Maturity rating of a region, derived from its access byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maturity {
    /// General audiences (access 13)
    General,
    /// Moderate content (access 21)
    Mature,
    /// Adult content (access 42)
    Adult,
}

impl Maturity {
    /// Maps an access byte onto a maturity rating.
    ///
    /// Anything up to 13 is general, up to 21 is mature, everything above is adult.
    pub fn from_access(access: u8) -> Self {
        match access {
            0..=13 => Maturity::General,
            14..=21 => Maturity::Mature,
            _ => Maturity::Adult,
        }
    }

    /// The canonical access byte for this rating.
    pub fn to_access(self) -> u8 {
        match self {
            Maturity::General => 13,
            Maturity::Mature => 21,
            Maturity::Adult => 42,
        }
    }
}

bitflags! {
    /// Directory-level flags attached to a region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionFlags: u32 {
        const DEFAULT_REGION = 1;
        const FALLBACK_REGION = 2;
        const REGION_ONLINE = 4;
        const NO_DIRECT_LOGIN = 8;
        const PERSISTENT = 16;
        const LOCKED_OUT = 32;
        const NO_MOVE = 64;
        const RESERVATION = 128;
        const AUTHENTICATE = 256;
        const HYPERLINK = 512;
        const DEFAULT_HG_REGION = 1024;
    }
}

impl Serialize for RegionFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for RegionFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

/// A locally hosted region's own descriptor.
///
/// Grid location is stored in region-grid units here, the way region
/// configuration expresses it; [`GridRegion`] works in length units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    pub region_id: RegionId,
    pub region_name: String,
    /// Grid column, in region-grid units
    pub grid_x: u32,
    /// Grid row, in region-grid units
    pub grid_y: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub external_host_name: String,
    pub http_port: u16,
    pub internal_endpoint: SocketAddr,
    pub access: u8,
    pub region_secret: String,
    pub estate_owner: Uuid,
    /// Explicit server URI, overriding the host/port default
    pub server_uri: Option<String>,
}

impl RegionInfo {
    /// Creates a standard-sized region descriptor at the given grid cell.
    pub fn new(
        region_id: RegionId,
        region_name: impl Into<String>,
        grid_x: u32,
        grid_y: u32,
    ) -> Self {
        Self {
            region_id,
            region_name: region_name.into(),
            grid_x,
            grid_y,
            size_x: REGION_SIZE,
            size_y: REGION_SIZE,
            external_host_name: "127.0.0.1".to_string(),
            http_port: 9000,
            internal_endpoint: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 9000)),
            access: Maturity::General.to_access(),
            region_secret: String::new(),
            estate_owner: Uuid::nil(),
            server_uri: None,
        }
    }
}

/// Addressable descriptor of a region on the grid.
///
/// # Identity
///
/// Two descriptors are equal iff both carry an assigned (non-zero)
/// [`RegionId`] and the ids match. Every other field may differ between a
/// stale and a fresh copy of the same region. A descriptor with a zero id
/// equals nothing, not even itself, which is why `GridRegion` implements
/// `PartialEq` but not `Eq`.
///
/// # Addressing
///
/// [`server_uri`](GridRegion::server_uri) is either the explicit override
/// (normalized to end in exactly one `/`) or `http://host[:port]/` built from
/// `external_host_name` and `http_port`.
///
/// # Examples
///
/// ```rust
/// use grid_types::{GridRegion, RegionId};
///
/// let mut region = GridRegion::new(RegionId::new(), "Welcome Island");
/// region.external_host_name = "sim1.example.org".to_string();
/// region.http_port = 9000;
/// assert_eq!(region.server_uri(), "http://sim1.example.org:9000/");
///
/// region.set_server_uri("https://gateway.example.org/sim1//");
/// assert_eq!(region.server_uri(), "https://gateway.example.org/sim1/");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRegion {
    pub region_id: RegionId,
    pub region_name: String,
    /// Absolute X position, in length units
    pub region_loc_x: u32,
    /// Absolute Y position, in length units
    pub region_loc_y: u32,
    pub region_size_x: u32,
    pub region_size_y: u32,
    pub external_host_name: String,
    pub http_port: u16,
    #[serde(default, deserialize_with = "deserialize_server_uri")]
    server_uri: Option<String>,
    pub internal_endpoint: SocketAddr,
    pub access: u8,
    /// `None` when the directory did not report flags (older grids)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_flags: Option<RegionFlags>,
    pub region_secret: String,
    pub token: String,
    pub estate_owner: Uuid,
}

impl Default for GridRegion {
    fn default() -> Self {
        Self {
            region_id: RegionId::ZERO,
            region_name: String::new(),
            region_loc_x: 0,
            region_loc_y: 0,
            region_size_x: REGION_SIZE,
            region_size_y: REGION_SIZE,
            external_host_name: String::new(),
            http_port: 0,
            server_uri: None,
            internal_endpoint: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            access: Maturity::General.to_access(),
            region_flags: None,
            region_secret: String::new(),
            token: String::new(),
            estate_owner: Uuid::nil(),
        }
    }
}

impl GridRegion {
    /// Creates a standard-sized descriptor with the given identity.
    pub fn new(region_id: RegionId, region_name: impl Into<String>) -> Self {
        Self {
            region_id,
            region_name: region_name.into(),
            ..Self::default()
        }
    }

    /// Grid column, in region-grid units.
    pub fn region_coord_x(&self) -> u32 {
        self.region_loc_x / REGION_SIZE
    }

    /// Grid row, in region-grid units.
    pub fn region_coord_y(&self) -> u32 {
        self.region_loc_y / REGION_SIZE
    }

    /// Packs the absolute location into a single 64-bit region handle.
    pub fn region_handle(&self) -> u64 {
        ((self.region_loc_x as u64) << 32) | self.region_loc_y as u64
    }

    /// Returns `true` if both extents are the standard region size.
    pub fn has_default_size(&self) -> bool {
        self.region_size_x == REGION_SIZE && self.region_size_y == REGION_SIZE
    }

    pub fn maturity(&self) -> Maturity {
        Maturity::from_access(self.access)
    }

    /// The URI remote transports address this region's node at.
    ///
    /// Deterministic for an unchanged descriptor and always terminated by a
    /// single `/`.
    pub fn server_uri(&self) -> String {
        if let Some(uri) = &self.server_uri {
            return uri.clone();
        }
        if self.http_port == 0 {
            format!("http://{}/", self.external_host_name)
        } else {
            format!("http://{}:{}/", self.external_host_name, self.http_port)
        }
    }

    /// Sets an explicit server URI, normalizing the trailing separator.
    ///
    /// An empty value clears the override so the host/port default applies again.
    pub fn set_server_uri(&mut self, uri: impl AsRef<str>) {
        self.server_uri = normalize_server_uri(uri.as_ref());
    }

    /// Returns `true` if an explicit server URI has been set.
    pub fn has_explicit_server_uri(&self) -> bool {
        self.server_uri.is_some()
    }

    /// Serializes the descriptor into the grid directory's string map form.
    pub fn to_key_value_pairs(&self) -> HashMap<String, String> {
        let mut kvp = HashMap::new();
        kvp.insert("uuid".to_string(), self.region_id.to_string());
        kvp.insert("locX".to_string(), self.region_loc_x.to_string());
        kvp.insert("locY".to_string(), self.region_loc_y.to_string());
        kvp.insert("sizeX".to_string(), self.region_size_x.to_string());
        kvp.insert("sizeY".to_string(), self.region_size_y.to_string());
        kvp.insert("regionName".to_string(), self.region_name.clone());
        kvp.insert("serverIP".to_string(), self.external_host_name.clone());
        kvp.insert("serverHttpPort".to_string(), self.http_port.to_string());
        kvp.insert("serverURI".to_string(), self.server_uri());
        kvp.insert("serverPort".to_string(), self.internal_endpoint.port().to_string());
        kvp.insert("access".to_string(), self.access.to_string());
        kvp.insert("regionSecret".to_string(), self.region_secret.clone());
        kvp.insert("owner_uuid".to_string(), self.estate_owner.to_string());
        kvp.insert("Token".to_string(), self.token.clone());
        if let Some(flags) = self.region_flags {
            kvp.insert("flags".to_string(), flags.bits().to_string());
        }
        kvp
    }

    /// Reads a descriptor from the grid directory's string map form.
    ///
    /// Missing sizes fall back to [`REGION_SIZE`] and a missing `flags` entry
    /// leaves [`region_flags`](GridRegion::region_flags) unknown. Only `uuid`
    /// is mandatory.
    pub fn from_key_value_pairs(kvp: &HashMap<String, String>) -> Result<Self, GridRegionError> {
        let mut region = GridRegion::default();

        let uuid = kvp.get("uuid").ok_or(GridRegionError::MissingField("uuid"))?;
        region.region_id = parse_field("uuid", uuid)?;

        if let Some(value) = kvp.get("locX") {
            region.region_loc_x = parse_field("locX", value)?;
        }
        if let Some(value) = kvp.get("locY") {
            region.region_loc_y = parse_field("locY", value)?;
        }
        if let Some(value) = kvp.get("sizeX") {
            region.region_size_x = parse_field("sizeX", value)?;
        }
        if let Some(value) = kvp.get("sizeY") {
            region.region_size_y = parse_field("sizeY", value)?;
        }
        if let Some(value) = kvp.get("regionName") {
            region.region_name = value.clone();
        }
        if let Some(value) = kvp.get("serverIP") {
            region.external_host_name = value.clone();
        }
        if let Some(value) = kvp.get("serverHttpPort") {
            region.http_port = parse_field("serverHttpPort", value)?;
        }
        if let Some(value) = kvp.get("serverURI") {
            region.set_server_uri(value);
        }
        if let Some(value) = kvp.get("serverPort") {
            let port: u16 = parse_field("serverPort", value)?;
            region.internal_endpoint =
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        }
        if let Some(value) = kvp.get("access") {
            region.access = parse_field("access", value)?;
        }
        if let Some(value) = kvp.get("regionSecret") {
            region.region_secret = value.clone();
        }
        if let Some(value) = kvp.get("owner_uuid") {
            region.estate_owner = parse_field("owner_uuid", value)?;
        }
        if let Some(value) = kvp.get("Token") {
            region.token = value.clone();
        }
        if let Some(value) = kvp.get("flags") {
            let bits: u32 = parse_field("flags", value)?;
            region.region_flags = Some(RegionFlags::from_bits_retain(bits));
        }

        Ok(region)
    }
}

fn parse_field<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
) -> Result<T, GridRegionError> {
    value.trim().parse().map_err(|_| GridRegionError::InvalidField {
        key,
        value: value.to_string(),
    })
}

/// Strips trailing separators and appends exactly one. Blank means no override.
fn normalize_server_uri(uri: &str) -> Option<String> {
    let trimmed = uri.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{trimmed}/"))
    }
}

fn deserialize_server_uri<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let uri = Option::<String>::deserialize(deserializer)?;
    Ok(uri.as_deref().and_then(normalize_server_uri))
}

impl TryFrom<&RegionInfo> for GridRegion {
    type Error = GridRegionError;

    /// Converts grid units to length units, refusing cells past
    /// [`MAX_GRID_COORD`].
    fn try_from(info: &RegionInfo) -> Result<Self, Self::Error> {
        let out_of_range = || GridRegionError::LocationOutOfRange {
            grid_x: info.grid_x,
            grid_y: info.grid_y,
        };
        let region_loc_x = info.grid_x.checked_mul(REGION_SIZE).ok_or_else(out_of_range)?;
        let region_loc_y = info.grid_y.checked_mul(REGION_SIZE).ok_or_else(out_of_range)?;

        let mut region = GridRegion {
            region_id: info.region_id,
            region_name: info.region_name.clone(),
            region_loc_x,
            region_loc_y,
            region_size_x: info.size_x,
            region_size_y: info.size_y,
            external_host_name: info.external_host_name.clone(),
            http_port: info.http_port,
            server_uri: None,
            internal_endpoint: info.internal_endpoint,
            access: info.access,
            region_flags: None,
            region_secret: info.region_secret.clone(),
            token: String::new(),
            estate_owner: info.estate_owner,
        };
        if let Some(uri) = &info.server_uri {
            region.set_server_uri(uri);
        }
        Ok(region)
    }
}

impl PartialEq for GridRegion {
    fn eq(&self, other: &Self) -> bool {
        !self.region_id.is_zero() && self.region_id == other.region_id
    }
}

impl Hash for GridRegion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region_id.hash(state);
    }
}
