//! HTTP API handlers for locus-server

pub mod health;
pub mod locations;
pub mod sse;
pub mod telemetry;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub use health::{get_build_info, health_routes};
pub use locations::{get_beacon_locations, get_device_locations};
pub use sse::event_stream;
pub use telemetry::post_beacon_data;

/// Body of every rejected request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler rejection: status plus `{"error": ...}` body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}
