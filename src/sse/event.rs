use serde::{Deserialize, Serialize};

use crate::protocol::{Attachment, ErrorResponse, MetaResponse, PartialResponse};

/// An event the server emits on the wire. Each variant owns the exact
/// `{event, data}` shape described by `base.py`'s static event builders.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Text { text: String, index: Option<u32> },
    ReplaceResponse { text: String, index: Option<u32> },
    SuggestedReply { text: String, index: Option<u32> },
    File(Attachment),
    Data { metadata: String },
    Meta(MetaResponse),
    Error(ErrorResponse),
    Done,
}

impl ServerEvent {
    /// SSE `event:` field name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Text { .. } => "text",
            ServerEvent::ReplaceResponse { .. } => "replace_response",
            ServerEvent::SuggestedReply { .. } => "suggested_reply",
            ServerEvent::File(_) => "file",
            ServerEvent::Data { .. } => "data",
            ServerEvent::Meta(_) => "meta",
            ServerEvent::Error(_) => "error",
            ServerEvent::Done => "done",
        }
    }

    /// JSON payload for the SSE `data:` field.
    pub fn data_json(&self) -> serde_json::Value {
        match self {
            ServerEvent::Text { text, index } => text_payload(text, *index),
            ServerEvent::ReplaceResponse { text, index } => text_payload(text, *index),
            ServerEvent::SuggestedReply { text, index } => text_payload(text, *index),
            ServerEvent::File(attachment) => serde_json::to_value(attachment).unwrap(),
            ServerEvent::Data { metadata } => serde_json::json!({ "metadata": metadata }),
            ServerEvent::Meta(meta) => serde_json::to_value(meta).unwrap(),
            ServerEvent::Error(err) => serde_json::to_value(err).unwrap(),
            ServerEvent::Done => serde_json::json!({}),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ServerEvent::Text {
            text: text.into(),
            index: None,
        }
    }

    pub fn replace_response(text: impl Into<String>) -> Self {
        ServerEvent::ReplaceResponse {
            text: text.into(),
            index: None,
        }
    }

    pub fn suggested_reply(text: impl Into<String>) -> Self {
        ServerEvent::SuggestedReply {
            text: text.into(),
            index: None,
        }
    }

    pub fn error(text: impl Into<String>, allow_retry: bool) -> Self {
        ServerEvent::Error(ErrorResponse {
            allow_retry,
            text: Some(text.into()),
            raw_response: None,
            error_type: None,
        })
    }

    pub fn meta(meta: MetaResponse) -> Self {
        ServerEvent::Meta(meta)
    }

    pub fn done() -> Self {
        ServerEvent::Done
    }

    /// Build from a [`PartialResponse`] yielded by a user handler.
    pub fn from_partial(partial: &PartialResponse) -> Self {
        if let Some(attachment) = &partial.attachment {
            return ServerEvent::File(attachment.clone());
        }
        if let Some(data) = &partial.data {
            return ServerEvent::Data {
                metadata: data.to_string(),
            };
        }
        if partial.is_suggested_reply {
            return ServerEvent::SuggestedReply {
                text: partial.text.clone(),
                index: partial.index,
            };
        }
        if partial.is_replace_response {
            return ServerEvent::ReplaceResponse {
                text: partial.text.clone(),
                index: partial.index,
            };
        }
        ServerEvent::Text {
            text: partial.text.clone(),
            index: partial.index,
        }
    }
}

fn text_payload(text: &str, index: Option<u32>) -> serde_json::Value {
    match index {
        Some(i) => serde_json::json!({ "text": text, "index": i }),
        None => serde_json::json!({ "text": text }),
    }
}

/// An event parsed off the wire on the client side. Unlike [`ServerEvent`],
/// this also carries the variants a client must tolerate but never emits
/// itself (`ping`, and anything unrecognized).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Text(TextPayload),
    ReplaceResponse(TextPayload),
    SuggestedReply(TextPayload),
    File(Attachment),
    /// Opaque out-of-band metadata; `{metadata: <string>}` per spec 4.2.
    /// Never contains tool-call deltas — those arrive as `json` events.
    Data { metadata: String },
    /// An OpenAI-chunk-shaped payload, e.g. `{"choices":[{"delta":{...}}]}`,
    /// carrying streamed tool-call deltas or plain `delta.content` text.
    Json(serde_json::Value),
    Meta(MetaResponse),
    Error(ErrorResponse),
    Ping,
    Done,
    #[serde(other)]
    Unknown,
}

/// Why [`parse_client_event`] failed to produce a [`ClientEvent`]: either
/// the payload wasn't valid JSON at all, or (for `meta` events only) it
/// parsed as JSON but a field had the wrong type. Per spec 4.6/7, only the
/// former aborts the stream; the latter is reported to the peer and the
/// stream continues.
#[derive(Debug)]
pub enum ClientEventError {
    MalformedJson(serde_json::Error),
    InvalidMetaField(serde_json::Error),
}

impl std::fmt::Display for ClientEventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEventError::MalformedJson(err) => write!(f, "malformed JSON: {err}"),
            ClientEventError::InvalidMetaField(err) => write!(f, "invalid meta field: {err}"),
        }
    }
}

impl std::error::Error for ClientEventError {}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// Parse a raw `(event name, data string)` pair from `eventsource-stream`
/// into a [`ClientEvent`]. Structurally invalid JSON is a
/// [`ClientEventError::MalformedJson`]; a `meta` event whose data is valid
/// JSON but has a wrongly-typed field (e.g. a non-bool `linkify`) is a
/// [`ClientEventError::InvalidMetaField`] instead, so callers can report
/// and continue rather than aborting the stream.
pub fn parse_client_event(event_name: &str, data: &str) -> Result<ClientEvent, ClientEventError> {
    let value: serde_json::Value = if data.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(data).map_err(ClientEventError::MalformedJson)?
    };
    if event_name == "meta" {
        return serde_json::from_value::<MetaResponse>(value)
            .map(ClientEvent::Meta)
            .map_err(ClientEventError::InvalidMetaField);
    }
    let wrapped = serde_json::json!({ "event": event_name, "data": value });
    serde_json::from_value(wrapped).map_err(ClientEventError::MalformedJson)
}
