//! Background eviction of stale devices

use std::sync::Arc;
use std::time::Duration;

use locus_common::config::EvictionConfig;
use locus_common::time;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::SharedState;

/// Start the periodic eviction task
///
/// The first pass runs one full interval after startup.
pub fn spawn_eviction_task(state: Arc<SharedState>, config: EvictionConfig) -> JoinHandle<()> {
    let period = Duration::from_secs(config.interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Eviction task started ({}s interval, {}s max age)",
            period.as_secs(),
            config.max_age_secs
        );

        let shutdown = state.shutdown_token();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    run_eviction(&state, config.max_age_secs, time::now_epoch_secs()).await;
                }
                _ = shutdown.cancelled() => {
                    debug!("Eviction task stopped");
                    return;
                }
            }
        }
    })
}

/// One eviction pass at `now`
pub async fn run_eviction(state: &SharedState, max_age_secs: i64, now: i64) -> usize {
    let removed = state.evict_stale(max_age_secs, now).await;
    debug!("Eviction pass at {}: {} removed", now, removed);
    removed
}
