//! Event types broadcast to observers

use serde::{Deserialize, Serialize};

/// Current position of one tracked device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: i64,
    pub y: i64,
    pub last_seen: i64,
    /// Zone of the closest beacon, or "unknown" when no beacons are known
    pub zone: String,
}

/// Last known state of one beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconLocation {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub zone: String,
    pub last_seen: i64,
}

/// Locus event types
///
/// Serializes as the bare payload array; the event name travels separately
/// (SSE `event:` field).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LocusEvent {
    /// Positions of all tracked devices
    DeviceLocations(Vec<DeviceLocation>),

    /// State of all known beacons
    BeaconLocations(Vec<BeaconLocation>),
}

impl LocusEvent {
    /// Wire name of the event
    pub fn event_name(&self) -> &'static str {
        match self {
            LocusEvent::DeviceLocations(_) => "deviceLocations",
            LocusEvent::BeaconLocations(_) => "beaconLocations",
        }
    }
}
