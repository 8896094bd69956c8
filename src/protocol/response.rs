use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::message::Attachment;
use super::tool::ToolCallDefinitionDelta;

// ---------------------------------------------------------------------
// Streaming response elements (PartialResponse)
// ---------------------------------------------------------------------

/// One element of a streamed query response. Strict: unknown fields reject,
/// since a typo here would otherwise fail silently for bot authors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialResponse {
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
    #[serde(default)]
    pub is_replace_response: bool,
    #[serde(default)]
    pub is_suggested_reply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDefinitionDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl PartialResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn replace(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_replace_response: true,
            ..Default::default()
        }
    }

    pub fn suggested_reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_suggested_reply: true,
            ..Default::default()
        }
    }
}

/// Rendering hints, valid only as the first event of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaResponse {
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_true")]
    pub refetch_settings: bool,
    /// Deprecated by the platform but still sent; this crate keeps
    /// propagating it rather than silently dropping it.
    #[serde(default = "default_true")]
    pub linkify: bool,
    #[serde(default = "default_true")]
    pub suggested_replies: bool,
}

fn default_content_type() -> String {
    "text/markdown".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MetaResponse {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
            refetch_settings: true,
            linkify: true,
            suggested_replies: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default = "default_true")]
    pub allow_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

// ---------------------------------------------------------------------
// Settings self-description
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_clear_window_secs: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_attachments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction_message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub server_bot_dependencies: HashMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_image_comprehension: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_author_role_alternation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_multi_bot_chat_prompting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_controls: Option<ParameterControls>,
    #[serde(default = "default_response_version")]
    pub response_version: i32,
}

/// Resolves Open Question 4: the authoritative upstream default is `2`.
fn default_response_version() -> i32 {
    2
}

impl SettingsResponse {
    pub fn new() -> Self {
        Self {
            response_version: default_response_version(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------
// ParameterControls tree
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralValue {
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterValue {
    pub parameter_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "comparator")]
#[serde(deny_unknown_fields)]
pub enum ComparatorCondition {
    #[serde(rename = "equals")]
    Equals {
        left: ConditionOperand,
        right: ConditionOperand,
    },
    #[serde(rename = "not_equals")]
    NotEquals {
        left: ConditionOperand,
        right: ConditionOperand,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionOperand {
    Literal(LiteralValue),
    Parameter(ParameterValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueNamePair {
    pub value: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseControl {
    pub parameter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextField {
    #[serde(flatten)]
    pub base: BaseControl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextArea {
    #[serde(flatten)]
    pub base: BaseControl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropDown {
    #[serde(flatten)]
    pub base: BaseControl,
    pub options: Vec<ValueNamePair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleSwitch {
    #[serde(flatten)]
    pub base: BaseControl,
    #[serde(default)]
    pub default_value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slider {
    #[serde(flatten)]
    pub base: BaseControl,
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectRatioOption {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectRatio {
    #[serde(flatten)]
    pub base: BaseControl,
    pub options: Vec<AspectRatioOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "control_type", deny_unknown_fields)]
pub enum Control {
    Divider,
    TextField(TextField),
    TextArea(TextArea),
    DropDown(DropDown),
    ToggleSwitch(ToggleSwitch),
    Slider(Slider),
    AspectRatio(AspectRatio),
    ConditionallyRenderControls(Box<ConditionallyRenderControls>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionallyRenderControls {
    pub condition: ComparatorCondition,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    pub title: String,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tab {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterControls {
    pub tabs: Vec<Tab>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "2".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_response_rejects_unknown_fields() {
        let raw = serde_json::json!({"text": "hi", "oops": 1});
        let result: Result<PartialResponse, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }

    #[test]
    fn settings_response_default_version_is_2() {
        let settings = SettingsResponse::new();
        assert_eq!(settings.response_version, 2);
    }

    #[test]
    fn meta_response_defaults_all_true() {
        let meta = MetaResponse::default();
        assert!(meta.linkify);
        assert!(meta.suggested_replies);
        assert!(meta.refetch_settings);
    }

    #[test]
    fn parameter_controls_round_trip() {
        let controls = ParameterControls {
            tabs: vec![Tab {
                title: "General".to_string(),
                sections: vec![Section {
                    title: "Sampling".to_string(),
                    controls: vec![Control::ToggleSwitch(ToggleSwitch {
                        base: BaseControl {
                            parameter_name: "verbose".to_string(),
                            display_name: None,
                            description: None,
                        },
                        default_value: false,
                    })],
                }],
            }],
            api_version: default_api_version(),
        };
        let json = serde_json::to_string(&controls).unwrap();
        let back: ParameterControls = serde_json::from_str(&json).unwrap();
        assert_eq!(controls, back);
    }
}
