use bytes::Bytes;

use super::event::{parse_client_event, ClientEvent, ClientEventError, ServerEvent};

/// Render one [`ServerEvent`] as a `text/event-stream` frame.
///
/// Matches the shape FastAPI's `EventSourceResponse` produces: an `event:`
/// line, one `data:` line carrying compact JSON, and a trailing blank line.
pub fn encode_sse_frame(event: &ServerEvent) -> Bytes {
    let data = event.data_json();
    let frame = format!(
        "event: {}\ndata: {}\n\n",
        event.event_name(),
        serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string())
    );
    Bytes::from(frame)
}

/// Decode a single `eventsource_stream::Event` into a [`ClientEvent`].
///
/// Returns a [`ClientEventError`] distinguishing structurally malformed
/// JSON (abort the stream) from a `meta` event with a wrongly-typed field
/// (report to the peer and continue), per the validation-error path in the
/// spec.
pub fn decode_client_event(
    event: &eventsource_stream::Event,
) -> Result<ClientEvent, ClientEventError> {
    parse_client_event(&event.event, &event.data)
}
