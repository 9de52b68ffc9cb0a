//! locus-server library - RSSI indoor location service
//!
//! Beacons post averaged RSSI readings; the engine turns them into device
//! positions and pushes snapshots to SSE observers.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod db;
pub mod engine;
pub mod scheduler;
pub mod state;

use engine::{Anchor, LocationEngine, PathLossModel};
use state::SharedState;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

impl AppState {
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/beacons/data", post(api::post_beacon_data))
        .route("/api/devices/locations", get(api::get_device_locations))
        .route("/api/beacons/locations", get(api::get_beacon_locations))
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rebuild the engine from storage
///
/// Beacons come back in row order; devices with unreadable RSSI tables come
/// back with empty tables.
pub async fn load_engine(db: &SqlitePool, model: PathLossModel) -> locus_common::Result<LocationEngine> {
    let anchors: Vec<Anchor> = db::beacons::load_beacons(db)
        .await?
        .into_iter()
        .map(Anchor::from)
        .collect();
    let devices: Vec<_> = db::devices::load_devices(db)
        .await?
        .into_iter()
        .map(db::DeviceRecord::into_device)
        .collect();

    info!(
        "Restored {} beacon(s) and {} device(s) from storage",
        anchors.len(),
        devices.len()
    );

    Ok(LocationEngine::restore(model, anchors, devices))
}
