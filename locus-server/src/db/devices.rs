//! Device persistence
//!
//! The per-beacon RSSI table is stored as JSON in `rssi_values`. A row whose
//! table cannot be parsed is loaded with an empty table: a degraded estimate
//! beats refusing to track the device.

use locus_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::engine::{Device, Point, RssiTable};

/// Row of the `device_locations` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeviceRecord {
    pub id: i64,
    pub mac_address: String,
    pub name: Option<String>,
    pub x: i64,
    pub y: i64,
    pub last_seen: i64,
    pub rssi_values: String,
}

impl DeviceRecord {
    pub fn from_device(device: &Device) -> Result<Self> {
        Ok(Self {
            id: device.id,
            mac_address: device.mac_address.clone(),
            name: device.name.clone(),
            x: device.position.x,
            y: device.position.y,
            last_seen: device.last_seen,
            rssi_values: device.rssi_table.to_json()?,
        })
    }

    /// Convert to an engine device, treating a corrupt RSSI table as empty
    pub fn into_device(self) -> Device {
        let rssi_table = match RssiTable::from_json(&self.rssi_values) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    "Discarding unreadable RSSI table for {}: {}",
                    self.mac_address, e
                );
                RssiTable::new()
            }
        };

        Device {
            id: self.id,
            mac_address: self.mac_address,
            name: self.name,
            position: Point::new(self.x, self.y),
            last_seen: self.last_seen,
            rssi_table,
        }
    }
}

/// Insert or update a device by hardware address
///
/// A NULL name does not overwrite a stored name.
pub async fn save_device(db: &Pool<Sqlite>, device: &DeviceRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO device_locations (mac_address, name, x, y, last_seen, rssi_values)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(mac_address) DO UPDATE SET
            name = COALESCE(excluded.name, device_locations.name),
            x = excluded.x,
            y = excluded.y,
            last_seen = excluded.last_seen,
            rssi_values = excluded.rssi_values
        "#,
    )
    .bind(&device.mac_address)
    .bind(&device.name)
    .bind(device.x)
    .bind(device.y)
    .bind(device.last_seen)
    .bind(&device.rssi_values)
    .execute(db)
    .await?;

    Ok(())
}

/// All devices
pub async fn load_devices(db: &Pool<Sqlite>) -> Result<Vec<DeviceRecord>> {
    let devices = sqlx::query_as::<_, DeviceRecord>(
        "SELECT id, mac_address, name, x, y, last_seen, rssi_values FROM device_locations ORDER BY id",
    )
    .fetch_all(db)
    .await?;

    Ok(devices)
}

/// Delete devices last seen before `cutoff` (epoch seconds)
///
/// Returns the number of rows deleted.
pub async fn delete_devices_seen_before(db: &Pool<Sqlite>, cutoff: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM device_locations WHERE last_seen < ?")
        .bind(cutoff)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}
