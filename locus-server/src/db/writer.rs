//! Background persistence writer
//!
//! Ingest never waits on storage. State changes are queued as
//! [`PersistCommand`]s and applied in order by a single task; failures are
//! logged and otherwise ignored.

use sqlx::{Pool, Sqlite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::beacons::{save_beacon, BeaconRecord};
use super::devices::{delete_devices_seen_before, save_device, DeviceRecord};

/// One queued storage operation
#[derive(Debug)]
pub enum PersistCommand {
    SaveBeacon(BeaconRecord),
    SaveDevice(DeviceRecord),
    /// Remove devices last seen before the cutoff (epoch seconds)
    DeleteDevicesSeenBefore(i64),
    /// Acknowledged once every earlier command has been applied
    Flush(oneshot::Sender<()>),
}

/// Sending side of the writer queue
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistenceHandle {
    /// Handle plus the raw receiver, for tests that inspect the queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PersistCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a command without waiting for it
    pub fn submit(&self, command: PersistCommand) {
        if self.tx.send(command).is_err() {
            warn!("Persistence writer has stopped; dropping write");
        }
    }

    /// Wait until everything queued so far has been written
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.submit(PersistCommand::Flush(ack_tx));
        // Sender dropped means the writer is gone; nothing left to wait for
        let _ = ack_rx.await;
    }
}

/// Start the writer task on `db`
///
/// The task ends when every [`PersistenceHandle`] has been dropped.
pub fn spawn_writer(db: Pool<Sqlite>) -> (PersistenceHandle, JoinHandle<()>) {
    let (handle, mut rx) = PersistenceHandle::channel();

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            apply(&db, command).await;
        }
        debug!("Persistence writer stopped");
    });

    (handle, task)
}

async fn apply(db: &Pool<Sqlite>, command: PersistCommand) {
    match command {
        PersistCommand::SaveBeacon(record) => {
            if let Err(e) = save_beacon(db, &record).await {
                error!("Failed to save beacon {}: {}", record.id, e);
            }
        }
        PersistCommand::SaveDevice(record) => {
            if let Err(e) = save_device(db, &record).await {
                error!("Failed to save device {}: {}", record.mac_address, e);
            }
        }
        PersistCommand::DeleteDevicesSeenBefore(cutoff) => match delete_devices_seen_before(db, cutoff).await {
            Ok(0) => {}
            Ok(n) => debug!("Deleted {} stale device rows", n),
            Err(e) => error!("Failed to delete stale devices: {}", e),
        },
        PersistCommand::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}
