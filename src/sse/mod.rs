//! Server-Sent Events codec: translating [`crate::protocol::PartialResponse`]
//! and friends to and from `text/event-stream` frames.

mod codec;
mod event;

pub use codec::{decode_client_event, encode_sse_frame};
pub use event::{parse_client_event, ClientEvent, ClientEventError, ServerEvent, TextPayload};
