//! Server dispatcher (C5): `BotHost`, the axum router that serves a single
//! bot endpoint. Grounded on `other_examples/...goose-server-src-routes-reply.rs.rs`
//! for the axum handler / `mpsc::channel` / background `tokio::spawn` / custom
//! `Stream`+`IntoResponse` SSE shape (the teacher has no server component),
//! and on `original_source/src/fastapi_poe/base.py` for the routing, auth,
//! and event-ordering semantics.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::ServerConfig;
use crate::protocol::{
    PartialResponse, QueryRequest, ReportErrorRequest, ReportFeedbackRequest,
    ReportReactionRequest, RequestType, SettingsResponse,
};
use crate::sse::{encode_sse_frame, ServerEvent};

use super::pending_files::PendingFileQueue;

/// One element a bot handler can yield while answering a query: a
/// structured response, or a raw event passed through unmodified (for bots
/// that want to build the SSE frame themselves).
pub enum ResponseElement {
    Partial(PartialResponse),
    Raw(ServerEvent),
}

impl From<PartialResponse> for ResponseElement {
    fn from(partial: PartialResponse) -> Self {
        ResponseElement::Partial(partial)
    }
}

/// Context handed to a handler alongside the request: the current
/// message id (for attachment-ordering correlation) and a handle to the
/// pending-file queue so an uploader call can announce a `file` event
/// ahead of the handler's next yield.
#[derive(Clone)]
pub struct RequestContext {
    pub message_id: String,
    pending_files: Arc<PendingFileQueue>,
}

impl RequestContext {
    pub fn announce_file(&self, event: ServerEvent) {
        self.pending_files.enqueue(&self.message_id, event);
    }
}

/// User-implemented bot logic. Mirrors `PoeBot` in `base.py`: a streaming
/// query handler plus the three auxiliary hooks.
#[async_trait]
pub trait PoeBot: Send + Sync {
    fn get_response(
        &self,
        request: QueryRequest,
        ctx: RequestContext,
    ) -> Box<dyn Stream<Item = ResponseElement> + Send + Unpin>;

    async fn get_settings(&self) -> SettingsResponse {
        SettingsResponse::new()
    }

    async fn on_feedback(&self, _request: ReportFeedbackRequest) {}

    async fn on_reaction(&self, _request: ReportReactionRequest) {}

    async fn on_error(&self, request: ReportErrorRequest) {
        log::error!("bot error reported by platform: {}", request.message);
    }
}

pub struct BotHost {
    bot: Arc<dyn PoeBot>,
    config: ServerConfig,
    pending_files: Arc<PendingFileQueue>,
}

impl BotHost {
    pub fn new(bot: Arc<dyn PoeBot>, config: ServerConfig) -> Self {
        Self {
            bot,
            config,
            pending_files: Arc::new(PendingFileQueue::new()),
        }
    }

    pub fn into_router(self) -> Router {
        let path = self.config.path.clone();
        let state = Arc::new(self);
        let mut router = Router::new().route("/", get(index));
        if path != "/" {
            router = router.route(&path, post(dispatch)).with_state(state);
        } else {
            router = router.route("/", post(dispatch)).with_state(state);
        }
        router
    }

    fn check_auth(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.config.access_key else {
            return true;
        };
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return false;
        };
        let Ok(value) = value.to_str() else {
            return false;
        };
        value.strip_prefix("Bearer ").unwrap_or(value) == expected
    }
}

async fn index() -> Html<&'static str> {
    Html(
        "<html><body><p>This is a Poe bot server. Create a bot pointing at this \
         endpoint at <a href=\"https://poe.com/create_bot?server=1\">poe.com/create_bot</a>.</p></body></html>",
    )
}

async fn dispatch(
    State(host): State<Arc<BotHost>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !host.check_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(request_type) = body.get("type").and_then(|v| v.as_str()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match request_type {
        "query" => handle_query(host, body).await,
        "settings" => handle_settings(host).await,
        "report_feedback" => handle_report_feedback(host, body).await,
        "report_reaction" => handle_report_reaction(host, body).await,
        "report_error" => handle_report_error(host, body).await,
        other => {
            log::warn!("unsupported request type: {other}");
            StatusCode::NOT_IMPLEMENTED.into_response()
        }
    }
}

async fn handle_settings(host: Arc<BotHost>) -> Response {
    let settings = host.bot.get_settings().await;
    Json(settings).into_response()
}

async fn handle_report_feedback(host: Arc<BotHost>, body: serde_json::Value) -> Response {
    match serde_json::from_value::<ReportFeedbackRequest>(body) {
        Ok(request) => {
            host.bot.on_feedback(request).await;
            Json(serde_json::json!({})).into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn handle_report_reaction(host: Arc<BotHost>, body: serde_json::Value) -> Response {
    match serde_json::from_value::<ReportReactionRequest>(body) {
        Ok(request) => {
            host.bot.on_reaction(request).await;
            Json(serde_json::json!({})).into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn handle_report_error(host: Arc<BotHost>, body: serde_json::Value) -> Response {
    match serde_json::from_value::<ReportErrorRequest>(body) {
        Ok(request) => {
            host.bot.on_error(request).await;
            Json(serde_json::json!({})).into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn handle_query(host: Arc<BotHost>, body: serde_json::Value) -> Response {
    let mut request: QueryRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("malformed query request: {err}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    request.request_type = RequestType::Query;
    let message_id = request.message_id.clone();

    let (tx, rx) = mpsc::channel::<Bytes>(32);
    let pending_files = host.pending_files.clone();
    let bot = host.bot.clone();

    tokio::spawn(async move {
        let ctx = RequestContext {
            message_id: message_id.clone(),
            pending_files: pending_files.clone(),
        };
        let mut stream = bot.get_response(request, ctx);

        loop {
            for pending in pending_files.drain(&message_id) {
                if send_event(&tx, &pending).await.is_err() {
                    pending_files.clear(&message_id);
                    return;
                }
            }
            match stream.next().await {
                Some(element) => {
                    let event = match element {
                        ResponseElement::Partial(partial) => ServerEvent::from_partial(&partial),
                        ResponseElement::Raw(event) => event,
                    };
                    if send_event(&tx, &event).await.is_err() {
                        pending_files.clear(&message_id);
                        return;
                    }
                }
                None => break,
            }
        }

        for pending in pending_files.drain(&message_id) {
            if send_event(&tx, &pending).await.is_err() {
                pending_files.clear(&message_id);
                return;
            }
        }
        let _ = send_event(&tx, &ServerEvent::Done).await;
        pending_files.clear(&message_id);
    });

    SseBody::new(rx).into_response()
}

async fn send_event(tx: &mpsc::Sender<Bytes>, event: &ServerEvent) -> Result<(), ()> {
    tx.send(encode_sse_frame(event)).await.map_err(|_| ())
}

/// A `text/event-stream` response body backed by a channel, matching the
/// `SseResponse` shape in `goose-server`'s `reply.rs`.
struct SseBody {
    inner: ReceiverStream<Bytes>,
}

impl SseBody {
    fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for SseBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx).map(|opt| opt.map(Ok))
    }
}

impl IntoResponse for SseBody {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from_stream(self));
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, "text/event-stream".parse().unwrap());
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, "no-cache".parse().unwrap());
        response
            .headers_mut()
            .insert(header::CONNECTION, "keep-alive".parse().unwrap());
        response
    }
}
