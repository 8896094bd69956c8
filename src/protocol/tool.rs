use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-schema-shaped description of a callable tool, as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolFunctionDefinition,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunctionDefinition {
                name: name.into(),
                description: None,
                parameters,
            },
        }
    }
}

/// A complete, assembled tool call (post-aggregation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Raw JSON text, not yet parsed: arguments may arrive byte-by-byte and
    /// are only valid JSON once the whole call has streamed.
    pub arguments: String,
}

/// One streamed fragment of a tool call, keyed by `index` within the
/// response's tool_calls array. Any field besides `index` may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDefinitionDelta {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<ToolCallFunctionDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

/// The result of executing a tool call, sent back to the model as a
/// `role: tool` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultDefinition {
    pub role: ToolRole,
    pub name: String,
    pub tool_call_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolRole {
    Tool,
}

impl ToolResultDefinition {
    pub fn new(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ToolRole::Tool,
            name: name.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}
