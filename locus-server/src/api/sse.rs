//! Server-Sent Events stream of location updates
//!
//! A new observer first receives both snapshots, then every event broadcast
//! after it subscribed. Streams end when the server shuts down.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use locus_common::events::LocusEvent;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::AppState;

/// GET /api/events
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before snapshotting so no update falls between the two
    let rx = state.shared.subscribe_events();
    let initial = state.shared.initial_events().await;

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                // Lagged: the next snapshot supersedes what was missed
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = stream::iter(initial)
        .chain(updates)
        .take_until(state.shared.shutdown_token().cancelled_owned())
        .filter_map(|event| async move { to_sse_event(&event).map(Ok) });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &LocusEvent) -> Option<Event> {
    match Event::default()
        .event(event.event_name())
        .id(Uuid::new_v4().to_string())
        .json_data(event)
    {
        Ok(sse_event) => Some(sse_event),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.event_name(), e);
            None
        }
    }
}
