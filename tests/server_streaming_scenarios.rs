//! End-to-end scenarios driven directly against a `BotHost` router: the
//! replace-response buffer reset and the first-meta-only rule, exercised
//! through the full dispatch path rather than unit-level SSE codec tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use futures::Stream;
use tower::ServiceExt;

use poe_bot_runtime::config::ServerConfig;
use poe_bot_runtime::protocol::{
    PartialResponse, ProtocolMessage, QueryRequest, ReportErrorRequest, ReportFeedbackRequest,
    ReportReactionRequest, Role, SettingsResponse,
};
use poe_bot_runtime::server::{BotHost, PoeBot, RequestContext, ResponseElement};
use poe_bot_runtime::sse::ServerEvent;

struct ReplacingBot;

#[async_trait]
impl PoeBot for ReplacingBot {
    fn get_response(
        &self,
        _request: QueryRequest,
        _ctx: RequestContext,
    ) -> Box<dyn Stream<Item = ResponseElement> + Send + Unpin> {
        Box::new(futures::stream::iter(vec![
            ResponseElement::Partial(PartialResponse::text("abc")),
            ResponseElement::Partial(PartialResponse::replace("XYZ")),
        ]))
    }

    async fn get_settings(&self) -> SettingsResponse {
        SettingsResponse::new()
    }
    async fn on_feedback(&self, _request: ReportFeedbackRequest) {}
    async fn on_reaction(&self, _request: ReportReactionRequest) {}
    async fn on_error(&self, _request: ReportErrorRequest) {}
}

struct MetaEmittingBot;

#[async_trait]
impl PoeBot for MetaEmittingBot {
    fn get_response(
        &self,
        _request: QueryRequest,
        _ctx: RequestContext,
    ) -> Box<dyn Stream<Item = ResponseElement> + Send + Unpin> {
        let mut first_meta = poe_bot_runtime::protocol::MetaResponse::default();
        first_meta.linkify = true;
        let mut second_meta = poe_bot_runtime::protocol::MetaResponse::default();
        second_meta.linkify = false;
        Box::new(futures::stream::iter(vec![
            ResponseElement::Raw(ServerEvent::Meta(first_meta)),
            ResponseElement::Partial(PartialResponse::text("a")),
            ResponseElement::Raw(ServerEvent::Meta(second_meta)),
        ]))
    }

    async fn get_settings(&self) -> SettingsResponse {
        SettingsResponse::new()
    }
    async fn on_feedback(&self, _request: ReportFeedbackRequest) {}
    async fn on_reaction(&self, _request: ReportReactionRequest) {}
    async fn on_error(&self, _request: ReportErrorRequest) {}
}

fn request() -> Request<Body> {
    let body = serde_json::to_vec(&QueryRequest::from_messages(vec![ProtocolMessage::new(
        Role::User,
        "hi",
    )]))
    .unwrap();
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn replace_response_event_follows_the_original_text_event() {
    let host = BotHost::new(Arc::new(ReplacingBot), ServerConfig::new());
    let router = host.into_router();
    let response = router.oneshot(request()).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("event: text\ndata: {\"text\":\"abc\"}"));
    assert!(text.contains("event: replace_response\ndata: {\"text\":\"XYZ\"}"));
    let text_pos = text.find("event: text").unwrap();
    let replace_pos = text.find("event: replace_response").unwrap();
    assert!(text_pos < replace_pos);
}

// The server dispatches exactly what the handler yields, unfiltered; the
// first-meta-only rule is a client-side concern (see
// `client::engine::tests::first_meta_is_honored_second_is_dropped`), so a
// handler that yields two `meta` raw events puts both of them on the wire.
#[tokio::test]
async fn raw_meta_events_are_forwarded_to_the_wire_unfiltered() {
    let host = BotHost::new(Arc::new(MetaEmittingBot), ServerConfig::new());
    let router = host.into_router();
    let response = router.oneshot(request()).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert_eq!(text.matches("event: meta").count(), 2);
    assert!(text.contains("\"linkify\":true"));
    assert!(text.contains("\"linkify\":false"));
    assert!(text.ends_with("event: done\ndata: {}\n\n"));
}
