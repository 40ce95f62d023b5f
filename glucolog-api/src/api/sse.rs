//! Server-Sent Events (SSE) stream of change events
//!
//! Streams each ingestion delta to connected clients as a
//! `data: <json>\n\n` frame. Every client gets its own broadcast receiver;
//! a client that disconnects only drops its own stream.

use crate::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /api/glucose-readings/stream - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.kind()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {e}");
                    None
                }
            },
            Err(e) => {
                // Lagged subscriber: skip ahead rather than stall the stream
                warn!("SSE stream error: {e:?}");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
