//! Snapshot endpoints

use axum::extract::State;
use axum::Json;
use locus_common::events::{BeaconLocation, DeviceLocation};

use crate::AppState;

/// GET /api/devices/locations
///
/// Also re-broadcasts the snapshot to every SSE observer.
pub async fn get_device_locations(State(state): State<AppState>) -> Json<Vec<DeviceLocation>> {
    Json(state.shared.broadcast_locations().await)
}

/// GET /api/beacons/locations
pub async fn get_beacon_locations(State(state): State<AppState>) -> Json<Vec<BeaconLocation>> {
    Json(state.shared.engine.read().await.anchor_snapshot())
}
