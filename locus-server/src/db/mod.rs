//! Storage adapter
//!
//! Durable cache of beacons and devices across restarts. The engine never
//! reads from storage after startup; writes go through the [`writer`] task.

pub mod beacons;
pub mod devices;
pub mod writer;

pub use beacons::BeaconRecord;
pub use devices::DeviceRecord;
pub use writer::{spawn_writer, PersistCommand, PersistenceHandle};
