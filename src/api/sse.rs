//! Server-Sent Events support

use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SessionEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(session_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn event_payload(event: &SessionEvent) -> (&'static str, Value) {
    match event {
        SessionEvent::Init { view, adapter } => (
            "init",
            json!({
                "type": "init",
                "session": to_json(view),
                "adapter": to_json(adapter)
            }),
        ),
        SessionEvent::StateChange { view } => (
            "state_change",
            json!({
                "type": "state_change",
                "session": to_json(view)
            }),
        ),
        SessionEvent::Command { command } => (
            "command",
            json!({
                "type": "command",
                "command": to_json(command)
            }),
        ),
        SessionEvent::Outcome { outcome } => (
            "outcome",
            json!({
                "type": "outcome",
                "outcome": to_json(outcome)
            }),
        ),
        SessionEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = event_payload(&event);
    Event::default().event(event_type).data(data.to_string())
}
