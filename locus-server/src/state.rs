//! Shared service state
//!
//! One [`LocationEngine`] behind a single `RwLock`, the observer broadcast
//! channel, and the persistence queue.

use locus_common::events::{DeviceLocation, LocusEvent};
use locus_common::telemetry::TelemetryReport;
use locus_common::Result;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::{BeaconRecord, DeviceRecord, PersistCommand, PersistenceHandle};
use crate::engine::LocationEngine;

/// Buffered events per observer before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// State accessible by every request handler and background task
pub struct SharedState {
    pub engine: RwLock<LocationEngine>,

    /// Event broadcaster for SSE observers
    pub event_tx: broadcast::Sender<LocusEvent>,

    pub persistence: PersistenceHandle,

    /// Cancelled once the server starts shutting down
    shutdown: CancellationToken,
}

impl SharedState {
    pub fn new(engine: LocationEngine, persistence: PersistenceHandle) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: RwLock::new(engine),
            event_tx,
            persistence,
            shutdown: CancellationToken::new(),
        }
    }

    /// Ends open SSE streams and background tasks
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Apply one validated report, persist the changes, notify observers
    ///
    /// The whole report is applied under one write lock and the snapshots
    /// are taken before it is released, so observers see each report's
    /// result in order.
    pub async fn ingest(&self, report: &TelemetryReport) -> Result<()> {
        let (devices, beacons) = {
            let mut engine = self.engine.write().await;
            let outcome = engine.apply_report(report)?;

            self.persistence
                .submit(PersistCommand::SaveBeacon(BeaconRecord::from(&outcome.anchor)));
            for fused in &outcome.fused {
                match DeviceRecord::from_device(&fused.device) {
                    Ok(record) => self.persistence.submit(PersistCommand::SaveDevice(record)),
                    Err(e) => warn!("Not persisting {}: {}", fused.device.mac_address, e),
                }
            }

            (engine.device_snapshot(), engine.anchor_snapshot())
        };

        debug!(
            "Report from {} applied: {} device(s) sighted, {} tracked",
            report.beacon_id,
            report.devices.len(),
            devices.len()
        );

        self.broadcast_event(LocusEvent::DeviceLocations(devices));
        self.broadcast_event(LocusEvent::BeaconLocations(beacons));
        Ok(())
    }

    /// Push the current device snapshot to all observers and return it
    pub async fn broadcast_locations(&self) -> Vec<DeviceLocation> {
        let devices = self.engine.read().await.device_snapshot();
        self.broadcast_event(LocusEvent::DeviceLocations(devices.clone()));
        devices
    }

    /// Both snapshots, for a newly connected observer
    pub async fn initial_events(&self) -> Vec<LocusEvent> {
        let engine = self.engine.read().await;
        vec![
            LocusEvent::DeviceLocations(engine.device_snapshot()),
            LocusEvent::BeaconLocations(engine.anchor_snapshot()),
        ]
    }

    /// Drop devices not seen for `max_age_secs`, in memory and in storage
    pub async fn evict_stale(&self, max_age_secs: i64, now: i64) -> usize {
        let removed = self.engine.write().await.evict_stale(max_age_secs, now);
        self.persistence
            .submit(PersistCommand::DeleteDevicesSeenBefore(now - max_age_secs));

        if removed > 0 {
            info!("Evicted {} stale device(s)", removed);
        }
        removed
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: LocusEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LocusEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PathLossModel;
    use locus_common::telemetry::{DeviceSighting, Location};
    use locus_common::Error;

    fn state() -> (SharedState, tokio::sync::mpsc::UnboundedReceiver<PersistCommand>) {
        let (handle, rx) = PersistenceHandle::channel();
        (SharedState::new(LocationEngine::new(PathLossModel::default()), handle), rx)
    }

    fn report(beacon_id: &str, last_seen: i64) -> TelemetryReport {
        TelemetryReport {
            beacon_id: beacon_id.to_string(),
            location: Location {
                zone: "hall".to_string(),
                x: 3,
                y: 4,
            },
            timestamp: last_seen,
            devices: vec![DeviceSighting {
                mac_address: "AA:BB".to_string(),
                rssi: -60.0,
                sample_count: 3,
                name: Some("tag".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn test_ingest_broadcasts_devices_then_beacons() {
        let (state, _rx) = state();
        let mut events = state.subscribe_events();

        state.ingest(&report("b1", 100)).await.unwrap();

        match events.recv().await.unwrap() {
            LocusEvent::DeviceLocations(devices) => {
                assert_eq!(devices.len(), 1);
                assert_eq!((devices[0].x, devices[0].y), (3, 4));
                assert_eq!(devices[0].zone, "hall");
            }
            other => panic!("unexpected event {:?}", other),
        }
        match events.recv().await.unwrap() {
            LocusEvent::BeaconLocations(beacons) => assert_eq!(beacons[0].id, "b1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ingest_queues_beacon_then_devices() {
        let (state, mut rx) = state();
        state.ingest(&report("b1", 100)).await.unwrap();

        assert!(matches!(rx.recv().await, Some(PersistCommand::SaveBeacon(b)) if b.id == "b1"));
        match rx.recv().await {
            Some(PersistCommand::SaveDevice(d)) => {
                assert_eq!(d.mac_address, "AA:BB");
                assert_eq!(d.name.as_deref(), Some("tag"));
                assert!(d.rssi_values.contains("\"b1\""));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_beacon_id() {
        let (state, _rx) = state();
        let result = state.ingest(&report("", 100)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(state.initial_events().await.iter().all(|e| match e {
            LocusEvent::DeviceLocations(d) => d.is_empty(),
            LocusEvent::BeaconLocations(b) => b.is_empty(),
        }));
    }

    #[tokio::test]
    async fn test_initial_events_contain_both_snapshots() {
        let (state, _rx) = state();
        state.ingest(&report("b1", 100)).await.unwrap();

        let events = state.initial_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name(), "deviceLocations");
        assert_eq!(events[1].event_name(), "beaconLocations");
    }

    #[tokio::test]
    async fn test_evict_stale_also_deletes_rows() {
        let (state, mut rx) = state();
        state.ingest(&report("b1", 1_000)).await.unwrap();
        // Drain the ingest writes
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        let removed = state.evict_stale(1800, 3_000).await;
        assert_eq!(removed, 1);
        assert!(matches!(
            rx.recv().await,
            Some(PersistCommand::DeleteDevicesSeenBefore(1200))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let (state, _rx) = state();
        let token = state.shutdown_token();
        assert!(!token.is_cancelled());

        state.shutdown();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_broadcast_locations_returns_snapshot() {
        let (state, _rx) = state();
        state.ingest(&report("b1", 100)).await.unwrap();
        let mut events = state.subscribe_events();

        let returned = state.broadcast_locations().await;
        assert_eq!(returned.len(), 1);
        assert_eq!(events.recv().await.unwrap(), LocusEvent::DeviceLocations(returned));
    }
}
