//! Server-sent event stream for the dashboard.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::app::AppState;
use crate::middleware::UserAuth;

const KEEP_ALIVE_SECS: u64 = 15;

/// GET /api/v1/events
///
/// Streams the caller's tenant events until the client disconnects.
pub async fn stream_events(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %auth.user_id, "Event stream opened");

    let stream = state.events.subscribe(auth.user_id).filter_map(|event| {
        match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode tenant event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    )
}
