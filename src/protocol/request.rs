use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::ProtocolMessage;
use super::tool::{ToolCallDefinition, ToolDefinition, ToolResultDefinition};

pub const PROTOCOL_VERSION: &str = "1.2";

/// Discriminant shared by every inbound request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Query,
    Settings,
    ReportFeedback,
    ReportReaction,
    ReportError,
}

/// Sampling knobs attached to a [`QueryRequest`]; all optional, all
/// platform-default when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_system_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_query_id: Option<String>,
    pub query: Vec<ProtocolMessage>,
    #[serde(flatten)]
    pub parameters: QueryParameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResultDefinition>,
    /// Deprecated alias for `access_key`; still honored for compatibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl QueryRequest {
    /// Build the default request used by `get_bot_response`: no identifiers,
    /// no sampling overrides, just a message list.
    pub fn from_messages(query: Vec<ProtocolMessage>) -> Self {
        Self {
            request_type: RequestType::Query,
            version: default_version(),
            user_id: String::new(),
            conversation_id: String::new(),
            message_id: String::new(),
            bot_query_id: None,
            query,
            parameters: QueryParameters::default(),
            tools: Vec::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            api_key: None,
            access_key: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// The key to use for outbound auth: `access_key` if present, otherwise
    /// the deprecated `api_key` alias.
    pub fn effective_key(&self) -> Option<&str> {
        self.access_key
            .as_deref()
            .or(self.api_key.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for RequestType {
    fn default() -> Self {
        RequestType::Query
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFeedbackRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
    pub message_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub feedback_type: super::message::FeedbackType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReactionRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
    pub message_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub reaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportErrorRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_version")]
    pub version: String,
    pub message: String,
    #[serde(default, flatten)]
    pub metadata: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{ProtocolMessage, Role};

    #[test]
    fn effective_key_prefers_access_key() {
        let mut req = QueryRequest::from_messages(vec![ProtocolMessage::new(Role::User, "hi")]);
        req.access_key = Some("abc".into());
        req.api_key = Some("legacy".into());
        assert_eq!(req.effective_key(), Some("abc"));
    }

    #[test]
    fn effective_key_falls_back_to_legacy_alias() {
        let mut req = QueryRequest::from_messages(vec![]);
        req.api_key = Some("legacy".into());
        assert_eq!(req.effective_key(), Some("legacy"));
    }

    #[test]
    fn query_request_round_trips() {
        let req = QueryRequest::from_messages(vec![ProtocolMessage::new(Role::User, "hi")]);
        let json = serde_json::to_string(&req).unwrap();
        let back: QueryRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
