use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a [`ProtocolMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Bot,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Bot => "bot",
            Role::Tool => "tool",
        };
        write!(f, "{s}")
    }
}

/// Rendering hint for a message's `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[serde(rename = "text/markdown")]
    Markdown,
    #[serde(rename = "text/plain")]
    Plain,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Markdown
    }
}

/// A file attached to a message, either inbound from the platform or produced
/// by [`crate::upload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_content: Option<String>,
}

/// `like`/`dislike` feedback attached to a bot message by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Like,
    Dislike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFeedback {
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Forward-compatible marker carried on a message; only `function_call` is
/// meaningful today, anything else is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageType(pub String);

/// One turn of conversation. Parsing is permissive: unrecognized fields are
/// accepted and ignored rather than rejected, so the platform can add fields
/// without breaking older bots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<MessageFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl ProtocolMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            content_type: ContentType::default(),
            message_id: None,
            timestamp: None,
            sender_id: None,
            attachments: Vec::new(),
            feedback: Vec::new(),
            message_type: None,
            parameters: HashMap::new(),
            metadata: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self.role, Role::Tool)
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_message_accepts_unknown_fields() {
        let raw = serde_json::json!({
            "role": "user",
            "content": "hi",
            "from_the_future": true,
        });
        let msg: ProtocolMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn default_content_type_is_markdown() {
        let raw = serde_json::json!({"role": "bot", "content": "x"});
        let msg: ProtocolMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.content_type, ContentType::Markdown);
    }

    #[test]
    fn display_matches_role_colon_content() {
        let msg = ProtocolMessage::new(Role::User, "hello");
        assert_eq!(msg.to_string(), "user: hello");
    }
}
