//! Location estimation and live-state engine
//!
//! - [`distance`]: RSSI to distance
//! - [`estimator`]: position from observations
//! - [`anchors`]: beacon registry
//! - [`tracker`]: device state and fusion
//! - [`publisher`]: broadcast payloads

pub mod anchors;
pub mod distance;
pub mod estimator;
pub mod publisher;
pub mod tracker;

pub use anchors::{Anchor, AnchorRegistry};
pub use distance::PathLossModel;
pub use estimator::{Estimate, Observation, Point};
pub use tracker::{Device, DeviceTracker, FuseOutcome, RssiTable};

use locus_common::events::{BeaconLocation, DeviceLocation};
use locus_common::telemetry::TelemetryReport;
use locus_common::Result;

/// Changes produced by applying one telemetry report
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// Reporting beacon after the update
    pub anchor: Anchor,
    /// One entry per device in the report, in report order
    pub fused: Vec<FuseOutcome>,
}

/// Beacon registry and device tracker, mutated together
#[derive(Debug, Default)]
pub struct LocationEngine {
    pub anchors: AnchorRegistry,
    pub tracker: DeviceTracker,
}

impl LocationEngine {
    pub fn new(model: PathLossModel) -> Self {
        Self {
            anchors: AnchorRegistry::new(),
            tracker: DeviceTracker::new(model),
        }
    }

    /// Rebuild from persisted state
    pub fn restore(
        model: PathLossModel,
        anchors: impl IntoIterator<Item = Anchor>,
        devices: impl IntoIterator<Item = Device>,
    ) -> Self {
        Self {
            anchors: AnchorRegistry::from_anchors(anchors),
            tracker: DeviceTracker::from_devices(model, devices),
        }
    }

    /// Register the reporting beacon, then fuse every device it saw
    pub fn apply_report(&mut self, report: &TelemetryReport) -> Result<ReportOutcome> {
        let location = &report.location;
        let anchor = self
            .anchors
            .update(
                &report.beacon_id,
                &location.zone,
                location.x,
                location.y,
                report.timestamp,
            )?
            .clone();

        let beacon_position = Point::new(location.x, location.y);
        let fused = report
            .devices
            .iter()
            .map(|sighting| {
                self.tracker.fuse(
                    &sighting.mac_address,
                    &report.beacon_id,
                    beacon_position,
                    sighting.rssi,
                    sighting.name.as_deref(),
                    report.timestamp,
                )
            })
            .collect();

        Ok(ReportOutcome { anchor, fused })
    }

    pub fn device_snapshot(&self) -> Vec<DeviceLocation> {
        publisher::device_snapshot(&self.tracker, &self.anchors)
    }

    pub fn anchor_snapshot(&self) -> Vec<BeaconLocation> {
        publisher::anchor_snapshot(&self.anchors)
    }

    pub fn evict_stale(&mut self, max_age_secs: i64, now: i64) -> usize {
        self.tracker.evict_stale(max_age_secs, now)
    }
}
