//! Broadcast payload projections
//!
//! Pure reads over the registry and tracker; nothing here mutates state.

use locus_common::events::{BeaconLocation, DeviceLocation};

use super::anchors::AnchorRegistry;
use super::tracker::DeviceTracker;

/// Zone reported for devices when no beacons are known
pub const UNKNOWN_ZONE: &str = "unknown";

/// Current location of every device, labelled with the closest beacon's zone
pub fn device_snapshot(tracker: &DeviceTracker, anchors: &AnchorRegistry) -> Vec<DeviceLocation> {
    tracker
        .iter()
        .map(|device| {
            let zone = anchors
                .closest_to(device.position.x, device.position.y)
                .map(|anchor| anchor.zone.clone())
                .unwrap_or_else(|| UNKNOWN_ZONE.to_string());

            DeviceLocation {
                mac_address: device.mac_address.clone(),
                name: device.name.clone(),
                x: device.position.x,
                y: device.position.y,
                last_seen: device.last_seen,
                zone,
            }
        })
        .collect()
}

/// Current state of every beacon, in registration order
pub fn anchor_snapshot(anchors: &AnchorRegistry) -> Vec<BeaconLocation> {
    anchors
        .iter()
        .map(|anchor| BeaconLocation {
            id: anchor.id.clone(),
            x: anchor.x,
            y: anchor.y,
            zone: anchor.zone.clone(),
            last_seen: anchor.last_seen,
        })
        .collect()
}
