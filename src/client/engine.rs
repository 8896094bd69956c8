//! Client SSE engine (C6): `BotClient`, the streaming state machine that
//! invokes another Poe bot and yields typed response events.
//!
//! Grounded directly on `original_source/src/fastapi_poe/client.py`'s
//! `perform_query_request`/`stream_request` state machine (chunks,
//! `event_count`, `error_reported`, the first-meta-only rule, retry with
//! partial-yield awareness), wired onto the teacher's
//! `eventsource_stream` + `async_stream::stream!` idiom from
//! `llm/openai.rs::chat()`.

use std::pin::Pin;

use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{
    FeedbackType, MetaResponse, PartialResponse, ProtocolMessage, QueryRequest,
    ReportErrorRequest, ReportFeedbackRequest, RequestType, SettingsRequest, SettingsResponse,
    ToolCallDefinitionDelta,
};
use crate::sse::{decode_client_event, ClientEvent, ClientEventError};

use super::toolcall::{ToolCallAssembler, ToolExecutables};

/// One element of a client-side response stream: either a text/attachment
/// chunk, or the (at most one, first-event-only) rendering-hint event.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Partial(PartialResponse),
    Meta(MetaResponse),
}

pub struct BotClient {
    client: Client,
    bot_name: String,
    config: ClientConfig,
}

impl BotClient {
    pub fn new(bot_name: impl Into<String>, config: ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builder should not fail with default TLS backend");
        Self {
            client,
            bot_name: bot_name.into(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.config.base_url, self.bot_name)
    }

    /// Build the default query used by `get_bot_response`: no identifiers,
    /// just a message list.
    pub fn get_bot_response(
        &self,
        messages: Vec<ProtocolMessage>,
    ) -> Pin<Box<dyn Stream<Item = Result<BotEvent, ClientError>> + Send + '_>> {
        self.stream_request(QueryRequest::from_messages(messages))
    }

    /// Stream a query request, applying the retry policy.
    pub fn stream_request(
        &self,
        request: QueryRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<BotEvent, ClientError>> + Send + '_>> {
        self.stream_request_with_tools(request, None)
    }

    /// Like [`Self::stream_request`], but when the model requests tool
    /// calls and `executables` is provided, executes them locally and
    /// resends the augmented request, forwarding its output instead of the
    /// raw tool-call deltas.
    pub fn stream_request_with_tools<'a>(
        &'a self,
        request: QueryRequest,
        executables: Option<&'a ToolExecutables>,
    ) -> Pin<Box<dyn Stream<Item = Result<BotEvent, ClientError>> + Send + 'a>> {
        let url = self.endpoint();
        run_query_stream(&self.client, url, self.bot_name.clone(), request, &self.config, executables)
    }

    /// Accumulate a full response: skips meta events and suggested replies,
    /// clears the buffer on `replace_response`, appends text otherwise.
    /// Fails if the stream ends without ever producing text.
    pub async fn get_final_response(&self, request: QueryRequest) -> Result<String, ClientError> {
        let mut stream = self.stream_request(request);
        let mut buffer = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                BotEvent::Meta(_) => continue,
                BotEvent::Partial(partial) if partial.is_suggested_reply => continue,
                BotEvent::Partial(partial) if partial.is_replace_response => {
                    buffer = partial.text;
                }
                BotEvent::Partial(partial) => {
                    buffer.push_str(&partial.text);
                }
            }
        }
        if buffer.is_empty() {
            return Err(ClientError::NonRetryable(
                "bot returned no text in response".to_string(),
            ));
        }
        Ok(buffer)
    }

    /// `Authorization: Bearer <access_key>` when one is configured, matching
    /// `_BotContext.headers` in the Python client.
    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(access_key) = &self.config.access_key {
            if let Ok(value) = format!("Bearer {access_key}").parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Tell the peer bot about user feedback on one of its messages.
    pub async fn report_feedback(
        &self,
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        feedback_type: FeedbackType,
    ) -> Result<(), ClientError> {
        let request = ReportFeedbackRequest {
            request_type: RequestType::ReportFeedback,
            version: crate::protocol::PROTOCOL_VERSION.to_string(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            feedback_type,
        };
        self.post_report(&request).await
    }

    /// Report an error encountered while talking to the peer bot, e.g. a
    /// validation failure while parsing its SSE stream.
    pub async fn report_error(
        &self,
        message: impl Into<String>,
        metadata: std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<(), ClientError> {
        let request = ReportErrorRequest {
            request_type: RequestType::ReportError,
            version: crate::protocol::PROTOCOL_VERSION.to_string(),
            message: message.into(),
            metadata,
        };
        self.post_report(&request).await
    }

    /// Fetch the peer bot's declared settings instead of pushing query
    /// traffic at it.
    pub async fn fetch_settings(&self) -> Result<SettingsResponse, ClientError> {
        let request = SettingsRequest {
            request_type: RequestType::Settings,
            version: crate::protocol::PROTOCOL_VERSION.to_string(),
        };
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.auth_headers())
            .json(&request)
            .send()
            .await
            .map_err(|err| ClientError::Retryable(format!("error fetching settings from bot {}: {err}", self.bot_name)))?;
        if !response.status().is_success() {
            return Err(ClientError::NonRetryable(format!(
                "bot {} returned HTTP {} while fetching settings",
                self.bot_name,
                response.status().as_u16()
            )));
        }
        response
            .json::<SettingsResponse>()
            .await
            .map_err(|err| ClientError::NonRetryable(format!("malformed settings response from bot {}: {err}", self.bot_name)))
    }

    async fn post_report(&self, body: &impl serde::Serialize) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.auth_headers())
            .json(body)
            .send()
            .await
            .map_err(|err| ClientError::Retryable(format!("error reporting to bot {}: {err}", self.bot_name)))?;
        if !response.status().is_success() {
            return Err(ClientError::NonRetryable(format!(
                "bot {} returned HTTP {} while reporting",
                self.bot_name,
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// What a `json` event's OpenAI-chunk-shaped payload resolves to, per spec
/// 4.7's two tail rules plus the normal tool-delta aggregation path.
enum JsonChunk {
    /// `choices[0].finish_reason` is non-null: end of function selection.
    FinishedChoice,
    /// `delta.content` is present: the model chose not to call a tool.
    Text(String),
    ToolDelta(ToolCallDefinitionDelta),
    /// Shape didn't match any of the above; nothing to do with it.
    Unrecognized,
}

fn classify_json_chunk(value: &serde_json::Value) -> JsonChunk {
    let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
        return JsonChunk::Unrecognized;
    };
    if choice.get("finish_reason").is_some_and(|fr| !fr.is_null()) {
        return JsonChunk::FinishedChoice;
    }
    let Some(delta) = choice.get("delta") else {
        return JsonChunk::Unrecognized;
    };
    if let Some(content) = delta.get("content").and_then(|v| v.as_str()) {
        return JsonChunk::Text(content.to_string());
    }
    match delta
        .get("tool_calls")
        .and_then(|tc| tc.get(0))
        .and_then(|tc| serde_json::from_value::<ToolCallDefinitionDelta>(tc.clone()).ok())
    {
        Some(delta) => JsonChunk::ToolDelta(delta),
        None => JsonChunk::Unrecognized,
    }
}

/// Best-effort peer notification for an SSE parsing failure, per spec 4.6:
/// the caller's retry/abort decision does not wait on this POST succeeding.
async fn report_validation_error(client: &Client, url: &str, message: &str) {
    let request = crate::protocol::ReportErrorRequest {
        request_type: RequestType::ReportError,
        version: crate::protocol::PROTOCOL_VERSION.to_string(),
        message: message.to_string(),
        metadata: std::collections::HashMap::new(),
    };
    if let Err(err) = client.post(url).json(&request).send().await {
        log::warn!("failed to report validation error to bot: {err}");
    }
}

/// What a single HTTP attempt resolved to once its SSE stream ended,
/// surfaced after all of its events have already been yielded.
enum AttemptEnd {
    Done(ToolCallAssembler),
    Retryable(String),
    NonRetryable(String),
}

/// Retry loop plus tool-call continuation loop, matching
/// `stream_request`'s `got_response`/`num_tries` bookkeeping: a failure
/// before any successful yield may retry up to `num_tries`; once
/// something has been yielded, a further failure still propagates but is
/// never silently swallowed. Events are yielded as soon as they arrive off
/// the wire, not buffered until the attempt finishes.
fn run_query_stream<'a>(
    client: &'a Client,
    url: String,
    bot_name: String,
    request: QueryRequest,
    config: &'a ClientConfig,
    executables: Option<&'a ToolExecutables>,
) -> Pin<Box<dyn Stream<Item = Result<BotEvent, ClientError>> + Send + 'a>> {
    Box::pin(try_stream! {
        let mut current_request = request;
        'rounds: loop {
            let mut got_response = false;

            for attempt in 0..config.num_tries {
                let response = match client.post(&url).json(&current_request).send().await {
                    Ok(response) => response,
                    Err(err) => {
                        let is_last = attempt + 1 == config.num_tries;
                        if got_response || is_last {
                            Err(ClientError::Retryable(format!(
                                "error communicating with bot {bot_name}: {err}"
                            )))?;
                            unreachable!();
                        }
                        tokio::time::sleep(config.retry_sleep).await;
                        continue;
                    }
                };
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let is_last = attempt + 1 == config.num_tries;
                    if got_response || is_last {
                        Err(ClientError::Retryable(format!(
                            "error communicating with bot {bot_name}: HTTP {} {body}",
                            status.as_u16()
                        )))?;
                        unreachable!();
                    }
                    tokio::time::sleep(config.retry_sleep).await;
                    continue;
                }

                let mut events = response.bytes_stream().eventsource();
                let mut event_count = 0u32;
                let mut assembler = ToolCallAssembler::new();
                let mut produced_text = false;
                let mut error_reported = false;
                let mut end = None;

                while let Some(event) = events.next().await {
                    let event = match event {
                        Ok(event) => event,
                        Err(err) => {
                            end = Some(AttemptEnd::Retryable(err.to_string()));
                            break;
                        }
                    };
                    event_count += 1;

                    let parsed = match decode_client_event(&event) {
                        Ok(parsed) => parsed,
                        Err(ClientEventError::MalformedJson(err)) => {
                            let message = format!("malformed JSON from bot: {err}");
                            report_validation_error(client, &url, &message).await;
                            end = Some(AttemptEnd::NonRetryable(message));
                            break;
                        }
                        Err(ClientEventError::InvalidMetaField(err)) => {
                            // A non-first meta event is ignored outright per
                            // spec 4.2, so only the first gets reported.
                            if event_count == 1 {
                                let message = format!("invalid meta field from bot: {err}");
                                report_validation_error(client, &url, &message).await;
                                error_reported = true;
                            }
                            continue;
                        }
                    };

                    match parsed {
                        ClientEvent::Done => {
                            if !produced_text && assembler.is_empty() && !error_reported {
                                report_validation_error(client, &url, "Bot returned no text in response").await;
                            }
                            end = Some(AttemptEnd::Done(assembler));
                            break;
                        }
                        ClientEvent::Text(payload) => {
                            got_response = true;
                            produced_text = true;
                            yield BotEvent::Partial(PartialResponse::text(payload.text));
                        }
                        ClientEvent::ReplaceResponse(payload) => {
                            got_response = true;
                            produced_text = true;
                            yield BotEvent::Partial(PartialResponse::replace(payload.text));
                        }
                        ClientEvent::SuggestedReply(payload) => {
                            yield BotEvent::Partial(PartialResponse::suggested_reply(payload.text));
                        }
                        ClientEvent::File(attachment) => {
                            got_response = true;
                            yield BotEvent::Partial(PartialResponse {
                                attachment: Some(attachment),
                                ..Default::default()
                            });
                        }
                        ClientEvent::Data { metadata } => {
                            yield BotEvent::Partial(PartialResponse {
                                data: serde_json::from_str(&metadata).ok(),
                                ..Default::default()
                            });
                        }
                        ClientEvent::Json(value) => match classify_json_chunk(&value) {
                            JsonChunk::FinishedChoice | JsonChunk::Unrecognized => {}
                            JsonChunk::Text(content) => {
                                got_response = true;
                                produced_text = true;
                                yield BotEvent::Partial(PartialResponse::text(content));
                            }
                            JsonChunk::ToolDelta(delta) => {
                                assembler.process_delta(&delta);
                            }
                        },
                        ClientEvent::Meta(meta) => {
                            if event_count == 1 {
                                yield BotEvent::Meta(meta);
                            }
                            // meta after the first event is ignored, per spec 4.2.
                        }
                        ClientEvent::Error(err) => {
                            end = Some(if err.allow_retry {
                                AttemptEnd::Retryable(err.text.unwrap_or_default())
                            } else {
                                AttemptEnd::NonRetryable(err.text.unwrap_or_default())
                            });
                            break;
                        }
                        ClientEvent::Ping => {}
                        ClientEvent::Unknown => {
                            let message = format!("Unknown event type: {}", event.event);
                            report_validation_error(client, &url, &message).await;
                            error_reported = true;
                        }
                    }
                }

                match end {
                    Some(AttemptEnd::Done(assembler)) => {
                        if assembler.is_empty() {
                            break 'rounds;
                        }
                        let Some(executables) = executables else { break 'rounds };
                        if executables.is_empty() {
                            break 'rounds;
                        }
                        let calls = assembler.into_tool_calls();
                        let results = executables.execute_all(&calls).await;
                        current_request.tool_calls = calls;
                        current_request.tool_results = results;
                        continue 'rounds;
                    }
                    Some(AttemptEnd::NonRetryable(message)) => {
                        Err(ClientError::NonRetryable(message))?;
                        unreachable!();
                    }
                    Some(AttemptEnd::Retryable(message)) => {
                        let is_last = attempt + 1 == config.num_tries;
                        if got_response || is_last {
                            Err(ClientError::Retryable(format!(
                                "error communicating with bot {bot_name}: {message}"
                            )))?;
                            unreachable!();
                        }
                        tokio::time::sleep(config.retry_sleep).await;
                    }
                    None => {
                        // Stream closed without a `done` event.
                        let is_last = attempt + 1 == config.num_tries;
                        if got_response || is_last {
                            Err(ClientError::Retryable(format!(
                                "error communicating with bot {bot_name}: bot exited without sending a 'done' event"
                            )))?;
                            unreachable!();
                        }
                        tokio::time::sleep(config.retry_sleep).await;
                    }
                }
            }
        }
    })
}
