//! Server-Sent Events framing for the streamable transport.

use crate::protocol::JsonRpcResponse;
use axum::response::sse::Event;
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Interval between heartbeat events on an open stream.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_ID_BYTES: usize = 8;

#[derive(Serialize)]
struct ConnectedData<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    session_id: &'a str,
}

#[derive(Serialize)]
struct HeartbeatData {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Fresh random event id.
pub fn new_event_id() -> String {
    super::random_token(EVENT_ID_BYTES)
}

fn event(name: &str) -> Event {
    Event::default().id(new_event_id()).event(name)
}

/// The single `message` event carrying a JSON-RPC response.
pub fn message_event(response: &JsonRpcResponse) -> Result<Event, axum::Error> {
    event("message").json_data(response)
}

/// First event on a stream, announcing the session id.
pub fn connection_event(session_id: &str) -> Result<Event, axum::Error> {
    event("connection").json_data(ConnectedData {
        kind: "connected",
        session_id,
    })
}

pub fn heartbeat_event() -> Result<Event, axum::Error> {
    event("heartbeat").json_data(HeartbeatData { kind: "ping" })
}

struct StreamGuard {
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!(session_id = %self.session_id, "SSE stream closed");
    }
}

/// Long-lived session stream: a `connection` event, then a `heartbeat`
/// every `interval` until `shutdown` is cancelled or the client goes away.
///
/// A client disconnect drops the stream, which ends the loop at its next
/// suspension point.
pub fn session_stream(
    session_id: String,
    interval: Duration,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    async_stream::stream! {
        let _guard = StreamGuard { session_id: session_id.clone() };
        debug!(session_id = %session_id, "SSE stream opened");
        yield connection_event(&session_id);

        let mut ticker = interval_at(Instant::now() + interval, interval);
        loop {
            let beat = tokio::select! {
                _ = shutdown.cancelled() => false,
                _ = ticker.tick() => true,
            };
            if !beat {
                debug!(session_id = %session_id, "SSE stream cancelled");
                break;
            }
            yield heartbeat_event();
        }
    }
}

/// A stream holding exactly one event.
pub fn single(event: Event) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    futures::stream::once(async move { Ok(event) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use axum::response::sse::Sse;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    #[test]
    fn test_event_ids_are_unique_hex() {
        let a = new_event_id();
        let b = new_event_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_session_stream_heartbeats_until_cancelled() {
        let shutdown = CancellationToken::new();
        let stream = session_stream("abc".into(), Duration::from_millis(10), shutdown.clone());
        let mut body = Sse::new(stream).into_response().into_body();

        let mut frames = Vec::new();
        for _ in 0..3 {
            let frame = body.frame().await.unwrap().unwrap();
            let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
            frames.push(parse_frame(&text));
        }

        assert_eq!(frames[0].event, "connection");
        assert_eq!(frames[0].data, json!({"type": "connected", "session_id": "abc"}));
        for heartbeat in &frames[1..] {
            assert_eq!(heartbeat.event, "heartbeat");
            assert_eq!(heartbeat.data, json!({"type": "ping"}));
        }
        let ids: HashSet<&str> = frames.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids.len(), frames.len());
        assert!(ids.iter().all(|id| id.len() == 16));

        shutdown.cancel();
        let end = tokio::time::timeout(Duration::from_secs(5), body.collect()).await;
        assert!(end.is_ok());
    }

    struct Frame {
        id: String,
        event: String,
        data: Value,
    }

    fn parse_frame(text: &str) -> Frame {
        let field = |name: &str| {
            text.lines()
                .find_map(|line| line.strip_prefix(name))
                .map(|rest| rest.trim_start().to_string())
                .unwrap_or_default()
        };
        Frame {
            id: field("id:"),
            event: field("event:"),
            data: serde_json::from_str(&field("data:")).unwrap(),
        }
    }
}
