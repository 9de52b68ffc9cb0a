//! Telemetry wire types exchanged between beacon agents and the server
//!
//! A beacon posts one [`TelemetryReport`] per scan window. The server accepts
//! the lenient [`RawTelemetry`] shape and validates it at the HTTP boundary,
//! so missing fields are reported as a 400 rather than a deserializer error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Declared position of the reporting beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub zone: String,
    pub x: i64,
    pub y: i64,
}

/// One device sighted by a beacon during a scan window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSighting {
    /// Hardware address of the device
    pub mac_address: String,
    /// Mean RSSI over the scan window (dBm)
    pub rssi: f64,
    /// Number of raw samples averaged into `rssi`
    #[serde(default)]
    pub sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Validated telemetry report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub beacon_id: String,
    pub location: Location,
    /// Epoch seconds
    pub timestamp: i64,
    pub devices: Vec<DeviceSighting>,
}

/// Telemetry report as received, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTelemetry {
    pub beacon_id: Option<String>,
    pub location: Option<Location>,
    /// Epoch seconds, possibly fractional
    pub timestamp: Option<f64>,
    pub devices: Option<Vec<DeviceSighting>>,
}

impl RawTelemetry {
    /// Validate required fields and normalize the timestamp
    ///
    /// `beacon_id` (non-empty), `location` and `devices` must be present.
    /// A missing or zero `timestamp` is replaced with `now`.
    pub fn validate(self, now: i64) -> Result<TelemetryReport> {
        let beacon_id = self
            .beacon_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("beacon_id is required".to_string()))?;
        let location = self
            .location
            .ok_or_else(|| Error::InvalidInput("location is required".to_string()))?;
        let devices = self
            .devices
            .ok_or_else(|| Error::InvalidInput("devices is required".to_string()))?;

        let timestamp = match self.timestamp {
            Some(ts) if ts != 0.0 && ts.is_finite() => crate::time::epoch_secs_from_f64(ts),
            _ => now,
        };

        Ok(TelemetryReport {
            beacon_id,
            location,
            timestamp,
            devices,
        })
    }
}
