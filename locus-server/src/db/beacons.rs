//! Beacon persistence

use locus_common::Result;
use sqlx::{Pool, Sqlite};

use crate::engine::Anchor;

/// Row of the `beacons` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BeaconRecord {
    pub id: String,
    pub zone: String,
    pub x: i64,
    pub y: i64,
    pub last_seen: i64,
}

impl From<&Anchor> for BeaconRecord {
    fn from(anchor: &Anchor) -> Self {
        Self {
            id: anchor.id.clone(),
            zone: anchor.zone.clone(),
            x: anchor.x,
            y: anchor.y,
            last_seen: anchor.last_seen,
        }
    }
}

impl From<BeaconRecord> for Anchor {
    fn from(record: BeaconRecord) -> Self {
        Self {
            id: record.id,
            zone: record.zone,
            x: record.x,
            y: record.y,
            last_seen: record.last_seen,
        }
    }
}

/// Insert or update a beacon
pub async fn save_beacon(db: &Pool<Sqlite>, beacon: &BeaconRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO beacons (id, zone, x, y, last_seen)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            zone = excluded.zone,
            x = excluded.x,
            y = excluded.y,
            last_seen = excluded.last_seen
        "#,
    )
    .bind(&beacon.id)
    .bind(&beacon.zone)
    .bind(beacon.x)
    .bind(beacon.y)
    .bind(beacon.last_seen)
    .execute(db)
    .await?;

    Ok(())
}

/// All beacons in first-registration order
pub async fn load_beacons(db: &Pool<Sqlite>) -> Result<Vec<BeaconRecord>> {
    let beacons = sqlx::query_as::<_, BeaconRecord>(
        "SELECT id, zone, x, y, last_seen FROM beacons ORDER BY rowid",
    )
    .fetch_all(db)
    .await?;

    Ok(beacons)
}
