//! Server-Sent-Events endpoint with optional session replay.
//!
//! `GET /api/sse?session_id=…&replay=session|none` streams each event as a
//! named SSE event (`event:` carries the workflow event kind, `data:` the
//! JSON envelope).  With `replay=session` the session's stored event
//! history is streamed before live events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::container::AppContainer;
use crate::events::{EventEnvelope, SessionEventBus};

#[derive(Debug, Deserialize)]
pub struct SseParams {
    pub session_id: String,
    /// `"session"` replays stored history first; anything else starts live.
    #[serde(default)]
    pub replay: Option<String>,
}

fn to_sse_event(envelope: &EventEnvelope) -> Event {
    let data = serde_json::to_string(envelope)
        .unwrap_or_else(|e| format!("{{\"error\":\"serialize: {e}\"}}"));
    Event::default().event(envelope.event.kind()).data(data)
}

/// Live tail of one session's bus channel.  Lag gaps are counted and
/// skipped; the stream ends when the bus side closes.
fn live_stream(
    bus: Arc<SessionEventBus>,
    rx: broadcast::Receiver<EventEnvelope>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((bus, rx), |(bus, mut rx)| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let event = to_sse_event(&envelope);
                    return Some((Ok(event), (bus, rx)));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    bus.record_lag(n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

pub async fn sse_handler(
    State(container): State<Arc<AppContainer>>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let bus = container.bus();
    // Subscribe before reading the replay history so no event falls
    // between the two streams.
    let rx = bus.subscribe(&params.session_id);

    let replay_events = if params.replay.as_deref() == Some("session") {
        match container
            .coordinator()
            .get_session(&params.session_id)
            .await
        {
            Ok(session) => session.events,
            Err(e) => {
                log::debug!("sse replay skipped for {}: {e}", params.session_id);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let replay = stream::iter(
        replay_events
            .iter()
            .map(|envelope| Ok(to_sse_event(envelope)))
            .collect::<Vec<_>>(),
    );

    Sse::new(replay.chain(live_stream(bus, rx))).keep_alive(KeepAlive::default())
}
