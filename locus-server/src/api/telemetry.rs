//! Telemetry ingest endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use locus_common::telemetry::RawTelemetry;
use locus_common::{time, Error};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{bad_request, ApiError, ErrorResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// POST /api/beacons/data
///
/// Malformed JSON and reports missing `beacon_id`, `location` or `devices`
/// are rejected with 400 before touching the engine.
pub async fn post_beacon_data(
    State(state): State<AppState>,
    payload: Result<Json<RawTelemetry>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(raw) = payload.map_err(|rejection| {
        warn!("Rejected telemetry body: {}", rejection.body_text());
        bad_request(format!("Invalid JSON: {}", rejection.body_text()))
    })?;

    let report = raw.validate(time::now_epoch_secs()).map_err(|e| {
        warn!("Rejected telemetry report: {}", e);
        bad_request(e.to_string())
    })?;

    debug!(
        "Telemetry from {} with {} device(s)",
        report.beacon_id,
        report.devices.len()
    );

    state.shared.ingest(&report).await.map_err(|e| match e {
        Error::InvalidInput(_) => bad_request(e.to_string()),
        other => {
            error!("Failed to apply report from {}: {}", report.beacon_id, other);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
        }
    })?;

    Ok(Json(StatusResponse {
        status: "success".to_string(),
    }))
}
