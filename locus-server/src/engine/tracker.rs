//! Device tracker
//!
//! Owns every tracked device: its per-beacon RSSI table, latest estimated
//! position and freshness. [`DeviceTracker::fuse`] is the only transition
//! that changes a device; [`DeviceTracker::evict_stale`] is the only one that
//! removes it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use super::distance::PathLossModel;
use super::estimator::{self, Estimate, Observation, Point, MIN_TRILATERATION_BEACONS};

/// Latest observation of one device from each beacon that has reported it
///
/// Holds at most one entry per beacon; a new report from a beacon overwrites
/// that beacon's entry in place. Entries keep the order in which beacons
/// first reported, which fixes the trilateration reference beacon and the
/// strongest-signal tie-break.
///
/// Serialized as a JSON object keyed by beacon id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssiTable {
    entries: Vec<Observation>,
}

impl RssiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `observation.beacon_id`
    pub fn upsert(&mut self, observation: Observation) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.beacon_id == observation.beacon_id)
        {
            Some(entry) => *entry = observation,
            None => self.entries.push(observation),
        }
    }

    pub fn get(&self, beacon_id: &str) -> Option<&Observation> {
        self.entries.iter().find(|e| e.beacon_id == beacon_id)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Serialize for RssiTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.beacon_id, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RssiTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RssiTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of beacon id to RSSI observation")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RssiTable, A::Error> {
                let mut table = RssiTable::new();
                while let Some((beacon_id, mut observation)) =
                    access.next_entry::<String, Observation>()?
                {
                    // The key is authoritative
                    observation.beacon_id = beacon_id;
                    table.upsert(observation);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// A tracked device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Storage row id; 0 until the device has been loaded from storage
    pub id: i64,
    pub mac_address: String,
    pub name: Option<String>,
    pub position: Point,
    /// Epoch seconds of the last report that included this device
    pub last_seen: i64,
    pub rssi_table: RssiTable,
}

impl Device {
    pub fn new(mac_address: &str) -> Self {
        Self {
            id: 0,
            mac_address: mac_address.to_string(),
            name: None,
            position: Point::default(),
            last_seen: 0,
            rssi_table: RssiTable::new(),
        }
    }
}

/// Result of fusing one report into a device
#[derive(Debug, Clone, PartialEq)]
pub struct FuseOutcome {
    /// Which estimation tier produced the position
    pub estimate: Estimate,
    /// Device state after the fuse
    pub device: Device,
}

/// Tracked devices keyed by hardware address
#[derive(Debug, Default)]
pub struct DeviceTracker {
    devices: BTreeMap<String, Device>,
    model: PathLossModel,
    /// Devices with enough beacons whose geometry still cannot be solved
    unsolvable: BTreeSet<String>,
}

impl DeviceTracker {
    pub fn new(model: PathLossModel) -> Self {
        Self {
            devices: BTreeMap::new(),
            model,
            unsolvable: BTreeSet::new(),
        }
    }

    /// Rebuild a tracker from persisted devices
    pub fn from_devices(model: PathLossModel, devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.mac_address.clone(), d))
            .collect();
        Self {
            devices,
            model,
            unsolvable: BTreeSet::new(),
        }
    }

    /// Fuse one beacon's reading of a device and re-estimate its position
    ///
    /// The estimate uses every beacon in the device's table, not only the one
    /// reporting now. `last_seen` is taken from the report, not the clock.
    /// A `None` name keeps the previously known name.
    pub fn fuse(
        &mut self,
        mac_address: &str,
        beacon_id: &str,
        beacon_position: Point,
        rssi: f64,
        name: Option<&str>,
        timestamp: i64,
    ) -> FuseOutcome {
        let device = self
            .devices
            .entry(mac_address.to_string())
            .or_insert_with(|| Device::new(mac_address));

        device.rssi_table.upsert(Observation {
            beacon_id: beacon_id.to_string(),
            x: beacon_position.x,
            y: beacon_position.y,
            rssi,
        });

        let estimate = estimator::estimate(device.rssi_table.observations(), &self.model);
        device.position = estimate.point().unwrap_or_default();
        device.last_seen = timestamp;
        if let Some(name) = name {
            device.name = Some(name.to_string());
        }

        // Logged on transitions only; collinear anchors would repeat every report
        let beacons = device.rssi_table.len();
        let solve_failed = beacons >= MIN_TRILATERATION_BEACONS && matches!(estimate, Estimate::StrongestSignal(_));
        if solve_failed {
            if self.unsolvable.insert(mac_address.to_string()) {
                info!(
                    "{} seen by {} beacons but their geometry is unsolvable; using strongest signal",
                    mac_address, beacons
                );
            }
        } else if self.unsolvable.remove(mac_address) {
            info!("{} trilaterating again", mac_address);
        }

        debug!(
            "Fused {} via {}: {:?} from {} beacon(s)",
            mac_address,
            beacon_id,
            estimate,
            device.rssi_table.len()
        );

        FuseOutcome {
            estimate,
            device: device.clone(),
        }
    }

    /// Remove devices last seen before `now - max_age_secs`
    ///
    /// Returns the number of devices removed.
    pub fn evict_stale(&mut self, max_age_secs: i64, now: i64) -> usize {
        let cutoff = now - max_age_secs;
        let before = self.devices.len();
        self.devices.retain(|_, device| device.last_seen >= cutoff);
        let devices = &self.devices;
        self.unsolvable.retain(|mac| devices.contains_key(mac));
        before - self.devices.len()
    }

    pub fn get(&self, mac_address: &str) -> Option<&Device> {
        self.devices.get(mac_address)
    }

    /// Devices ordered by hardware address
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn tracker() -> DeviceTracker {
        DeviceTracker::new(PathLossModel::default())
    }

    fn obs(beacon_id: &str, x: i64, y: i64, rssi: f64) -> Observation {
        Observation {
            beacon_id: beacon_id.to_string(),
            x,
            y,
            rssi,
        }
    }

    #[test]
    fn test_first_report_creates_device() {
        let mut tracker = tracker();
        let outcome = tracker.fuse("AA:BB", "b1", Point::new(3, 4), -60.0, Some("phone"), NOW);

        assert_eq!(outcome.estimate, Estimate::StrongestSignal(Point::new(3, 4)));
        let device = tracker.get("AA:BB").unwrap();
        assert_eq!(device.id, 0);
        assert_eq!(device.position, Point::new(3, 4));
        assert_eq!(device.last_seen, NOW);
        assert_eq!(device.name.as_deref(), Some("phone"));
        assert_eq!(device.rssi_table.len(), 1);
    }

    #[test]
    fn test_same_beacon_overwrites_entry() {
        let mut tracker = tracker();
        tracker.fuse("AA", "b1", Point::new(0, 0), -70.0, None, NOW);
        tracker.fuse("AA", "b1", Point::new(1, 1), -55.0, None, NOW + 5);

        let table = &tracker.get("AA").unwrap().rssi_table;
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("b1"), Some(&obs("b1", 1, 1, -55.0)));
    }

    #[test]
    fn test_new_beacon_accumulates_with_old() {
        let mut tracker = tracker();
        tracker.fuse("AA", "b1", Point::new(0, 0), -50.0, None, NOW);
        let outcome = tracker.fuse("AA", "b2", Point::new(10, 0), -80.0, None, NOW + 1);

        // b1 is still in the table and still strongest
        assert_eq!(outcome.device.rssi_table.len(), 2);
        assert_eq!(outcome.estimate, Estimate::StrongestSignal(Point::new(0, 0)));
    }

    #[test]
    fn test_third_beacon_enables_trilateration() {
        // -72.9794 dBm maps to ~5 m with the default model
        let rssi = -59.0 - 20.0 * 5f64.log10();
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), rssi, None, NOW);
        tracker.fuse("AA", "b", Point::new(10, 0), rssi, None, NOW);
        let outcome = tracker.fuse("AA", "c", Point::new(0, 10), rssi, None, NOW);

        assert_eq!(outcome.estimate, Estimate::Trilaterated(Point::new(5, 5)));
        assert_eq!(tracker.get("AA").unwrap().position, Point::new(5, 5));
    }

    #[test]
    fn test_collinear_beacons_use_strongest_signal() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -70.0, None, NOW);
        tracker.fuse("AA", "b", Point::new(5, 0), -58.0, None, NOW);
        let outcome = tracker.fuse("AA", "c", Point::new(10, 0), -66.0, None, NOW);

        assert_eq!(outcome.estimate, Estimate::StrongestSignal(Point::new(5, 0)));
    }

    #[test]
    fn test_unsolvable_geometry_tracked_until_solvable() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -70.0, None, NOW);
        tracker.fuse("AA", "b", Point::new(5, 0), -58.0, None, NOW);
        tracker.fuse("AA", "c", Point::new(10, 0), -66.0, None, NOW);
        tracker.fuse("AA", "c", Point::new(10, 0), -66.0, None, NOW);
        assert_eq!(tracker.unsolvable.len(), 1);
        assert!(tracker.unsolvable.contains("AA"));

        let outcome = tracker.fuse("AA", "d", Point::new(0, 10), -60.0, None, NOW);
        assert!(matches!(outcome.estimate, Estimate::Trilaterated(_)));
        assert!(tracker.unsolvable.is_empty());
    }

    #[test]
    fn test_evict_forgets_unsolvable_device() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -70.0, None, NOW - 2000);
        tracker.fuse("AA", "b", Point::new(5, 0), -58.0, None, NOW - 2000);
        tracker.fuse("AA", "c", Point::new(10, 0), -66.0, None, NOW - 2000);
        assert!(tracker.unsolvable.contains("AA"));

        assert_eq!(tracker.evict_stale(1800, NOW), 1);
        assert!(tracker.unsolvable.is_empty());
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -65.0, Some("tag"), NOW);
        tracker.fuse("AA", "b", Point::new(10, 0), -70.0, None, NOW);
        let first = tracker.fuse("AA", "c", Point::new(0, 10), -75.0, None, NOW);
        let second = tracker.fuse("AA", "c", Point::new(0, 10), -75.0, None, NOW);

        assert_eq!(first, second);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_last_seen_comes_from_report() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -65.0, None, 42);
        assert_eq!(tracker.get("AA").unwrap().last_seen, 42);
    }

    #[test]
    fn test_absent_name_keeps_previous() {
        let mut tracker = tracker();
        tracker.fuse("AA", "a", Point::new(0, 0), -65.0, Some("watch"), NOW);
        tracker.fuse("AA", "b", Point::new(1, 0), -65.0, None, NOW);
        assert_eq!(tracker.get("AA").unwrap().name.as_deref(), Some("watch"));

        tracker.fuse("AA", "b", Point::new(1, 0), -65.0, Some("renamed"), NOW);
        assert_eq!(tracker.get("AA").unwrap().name.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_evict_stale() {
        let mut tracker = tracker();
        tracker.fuse("old", "a", Point::new(0, 0), -65.0, None, NOW - 2000);
        tracker.fuse("fresh", "a", Point::new(0, 0), -65.0, None, NOW - 100);

        assert_eq!(tracker.evict_stale(1800, NOW), 1);
        assert!(tracker.get("old").is_none());
        assert!(tracker.get("fresh").is_some());

        // Idempotent
        assert_eq!(tracker.evict_stale(1800, NOW), 0);
    }

    #[test]
    fn test_evict_keeps_device_exactly_at_cutoff() {
        let mut tracker = tracker();
        tracker.fuse("edge", "a", Point::new(0, 0), -65.0, None, NOW - 1800);
        assert_eq!(tracker.evict_stale(1800, NOW), 0);
    }

    #[test]
    fn test_iter_ordered_by_mac() {
        let mut tracker = tracker();
        tracker.fuse("CC", "a", Point::new(0, 0), -65.0, None, NOW);
        tracker.fuse("AA", "a", Point::new(0, 0), -65.0, None, NOW);
        let macs: Vec<&str> = tracker.iter().map(|d| d.mac_address.as_str()).collect();
        assert_eq!(macs, vec!["AA", "CC"]);
    }

    #[test]
    fn test_rssi_table_json_keeps_order() {
        let mut table = RssiTable::new();
        table.upsert(obs("zeta", 0, 0, -60.0));
        table.upsert(obs("alpha", 10, 0, -61.5));

        let json = table.to_json().unwrap();
        assert!(json.find("zeta").unwrap() < json.find("alpha").unwrap());

        let parsed = RssiTable::from_json(&json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_rssi_table_reads_stored_shape() {
        let parsed = RssiTable::from_json(
            r#"{"b2":{"beacon_id":"b2","x":10,"y":0,"rssi":-70},"b1":{"beacon_id":"b1","x":0,"y":0,"rssi":-60}}"#,
        )
        .unwrap();
        let ids: Vec<&str> = parsed.observations().iter().map(|o| o.beacon_id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b1"]);
        assert_eq!(parsed.get("b2").unwrap().rssi, -70.0);
    }

    #[test]
    fn test_rssi_table_rejects_garbage() {
        assert!(RssiTable::from_json("not json").is_err());
        assert!(RssiTable::from_json("[1, 2, 3]").is_err());
    }
}
