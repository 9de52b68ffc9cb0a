//! Scan-and-report loop

use std::time::Duration;

use locus_common::telemetry::{DeviceSighting, TelemetryReport};
use locus_common::time;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info};

use crate::client::{ClientError, TelemetryClient};
use crate::config::BeaconConfig;
use crate::scan::{ScanAccumulator, Sighting};

/// Timing of the agent loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSettings {
    /// Length of one scan window
    pub scan_duration: Duration,
    /// Pause between windows
    pub scan_interval: Duration,
    /// Pause after a failed send
    pub error_backoff: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(30),
            scan_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
        }
    }
}

/// What happened at the end of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Sent(usize),
    Empty,
    Failed,
}

pub struct Agent {
    config: BeaconConfig,
    settings: AgentSettings,
    client: TelemetryClient,
}

impl Agent {
    pub fn new(config: BeaconConfig, settings: AgentSettings, client: TelemetryClient) -> Self {
        Self {
            config,
            settings,
            client,
        }
    }

    /// Run windows until the sighting source closes
    pub async fn run(&self, mut sightings: mpsc::Receiver<Sighting>) {
        info!(
            "Beacon {} in zone {} at ({}, {}) reporting to {}",
            self.config.beacon_id,
            self.config.zone,
            self.config.x,
            self.config.y,
            self.client.url()
        );

        loop {
            let (accumulator, closed) = collect_window(&mut sightings, self.settings.scan_duration).await;
            let outcome = self.report_window(accumulator).await;

            if closed {
                info!("Sighting source closed, stopping");
                return;
            }

            match outcome {
                WindowOutcome::Failed => sleep(self.settings.error_backoff).await,
                _ => sleep(self.settings.scan_interval).await,
            }

            // Sightings from the pause belong to no window
            let dropped = discard_pending(&mut sightings);
            if dropped > 0 {
                debug!("Discarded {} sighting(s) received between windows", dropped);
            }
        }
    }

    /// Send one window's averages; empty windows are skipped
    pub async fn report_window(&self, accumulator: ScanAccumulator) -> WindowOutcome {
        if accumulator.is_empty() {
            info!("No devices seen, nothing to send");
            return WindowOutcome::Empty;
        }

        let report = self.build_report(accumulator.finish(), time::now_epoch_secs());
        let count = report.devices.len();
        match self.client.send(&report).await {
            Ok(()) => {
                info!("Reported {} device(s)", count);
                WindowOutcome::Sent(count)
            }
            Err(ClientError::Rejected(status, body)) => {
                error!("Server rejected report (HTTP {}): {}", status, body);
                WindowOutcome::Failed
            }
            Err(e) => {
                error!("Failed to send report: {}", e);
                WindowOutcome::Failed
            }
        }
    }

    pub fn build_report(&self, devices: Vec<DeviceSighting>, timestamp: i64) -> TelemetryReport {
        TelemetryReport {
            beacon_id: self.config.beacon_id.clone(),
            location: self.config.location(),
            timestamp,
            devices,
        }
    }
}

/// Drop everything already queued; returns how many were dropped
pub fn discard_pending(sightings: &mut mpsc::Receiver<Sighting>) -> usize {
    let mut dropped = 0;
    while sightings.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

/// Accumulate sightings for `duration`
///
/// Returns early, with `true`, if the source closes.
pub async fn collect_window(
    sightings: &mut mpsc::Receiver<Sighting>,
    duration: Duration,
) -> (ScanAccumulator, bool) {
    let mut accumulator = ScanAccumulator::new();
    let deadline = Instant::now() + duration;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return (accumulator, false),
            next = sightings.recv() => match next {
                Some(sighting) => {
                    debug!("Sighting {} at {} dBm", sighting.mac_address, sighting.rssi);
                    accumulator.record(sighting);
                }
                None => return (accumulator, true),
            },
        }
    }
}
