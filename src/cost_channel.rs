//! Cost channel (C8): authorize/capture calls against the platform's cost
//! endpoint. Absent from the captured `original_source/` snapshot (see
//! DESIGN.md); implemented directly from the protocol description, styled
//! on the teacher's `reqwest` + SSE-parse idiom in `llm/openai.rs`.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;

use crate::error::CostError;
use crate::protocol::CostItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostOperation {
    Authorize,
    Capture,
}

impl CostOperation {
    fn path_segment(self) -> &'static str {
        match self {
            CostOperation::Authorize => "authorize",
            CostOperation::Capture => "capture",
        }
    }
}

pub struct CostChannel {
    client: Client,
    base_url: String,
}

impl CostChannel {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn authorize_cost(
        &self,
        bot_query_id: &str,
        access_key: &str,
        amounts: &[CostItem],
    ) -> Result<(), CostError> {
        self.send(bot_query_id, access_key, amounts, CostOperation::Authorize)
            .await
    }

    pub async fn capture_cost(
        &self,
        bot_query_id: &str,
        access_key: &str,
        amounts: &[CostItem],
    ) -> Result<(), CostError> {
        self.send(bot_query_id, access_key, amounts, CostOperation::Capture)
            .await
    }

    async fn send(
        &self,
        bot_query_id: &str,
        access_key: &str,
        amounts: &[CostItem],
        operation: CostOperation,
    ) -> Result<(), CostError> {
        if bot_query_id.is_empty() {
            return Err(CostError::MissingBotQueryId);
        }
        if access_key.is_empty() {
            return Err(CostError::MissingAccessKey);
        }

        let url = format!(
            "{}/cost/{bot_query_id}/{}",
            self.base_url,
            operation.path_segment()
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", access_key)
            .json(&serde_json::json!({ "amounts": amounts }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CostError::RequestError(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let bytes_stream = response.bytes_stream();
        let mut events = bytes_stream.eventsource();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => return Err(CostError::RequestError(err.to_string())),
            };
            if event.event != "result" {
                continue;
            }
            let payload: serde_json::Value = serde_json::from_str(&event.data)
                .map_err(|err| CostError::RequestError(err.to_string()))?;
            let is_success = payload
                .get("status")
                .and_then(|v| v.as_str())
                .map(|status| status == "success")
                .unwrap_or(false);
            return if is_success {
                Ok(())
            } else {
                Err(CostError::InsufficientFund)
            };
        }
        Err(CostError::RequestError(
            "cost channel closed without a result event".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn missing_bot_query_id_rejects_before_any_request() {
        let channel = CostChannel::new(Client::new(), "https://api.poe.com/bot");
        let result = channel.authorize_cost("", "key", &[CostItem::new(10)]).await;
        assert!(matches!(result, Err(CostError::MissingBotQueryId)));
    }

    #[tokio::test]
    async fn missing_access_key_rejects_before_any_request() {
        let channel = CostChannel::new(Client::new(), "https://api.poe.com/bot");
        let result = channel.authorize_cost("q1", "", &[CostItem::new(10)]).await;
        assert!(matches!(result, Err(CostError::MissingAccessKey)));
    }

    #[tokio::test]
    async fn successful_authorize_returns_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/cost/q1/authorize");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("event: result\ndata: {\"status\": \"success\"}\n\n");
        });

        let channel = CostChannel::new(Client::new(), server.base_url());
        let result = channel.authorize_cost("q1", "key", &[CostItem::new(10)]).await;
        mock.assert();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_success_status_is_insufficient_fund() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/cost/q1/capture");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("event: result\ndata: {\"status\": \"insufficient funds\"}\n\n");
        });

        let channel = CostChannel::new(Client::new(), server.base_url());
        let result = channel.capture_cost("q1", "key", &[CostItem::new(10)]).await;
        assert!(matches!(result, Err(CostError::InsufficientFund)));
    }

    #[tokio::test]
    async fn non_200_status_is_request_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/cost/q1/authorize");
            then.status(400).body("bad request");
        });

        let channel = CostChannel::new(Client::new(), server.base_url());
        let result = channel.authorize_cost("q1", "key", &[CostItem::new(10)]).await;
        assert!(matches!(result, Err(CostError::RequestError(_))));
    }
}
