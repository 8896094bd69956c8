//! Wire types for the bot protocol: requests inbound to a [`crate::server`],
//! responses streamed back out, and the shared message/attachment/tool model
//! used by both the server and the [`crate::client`].

mod cost;
mod message;
mod request;
mod response;
mod tool;

pub use cost::CostItem;
pub use message::{Attachment, ContentType, FeedbackType, MessageFeedback, MessageType, ProtocolMessage, Role};
pub use request::{
    BaseRequest, QueryParameters, QueryRequest, ReportErrorRequest, ReportFeedbackRequest,
    ReportReactionRequest, RequestType, SettingsRequest, PROTOCOL_VERSION,
};
pub use response::{
    AspectRatio, AspectRatioOption, BaseControl, ComparatorCondition, Control,
    ConditionallyRenderControls, ConditionOperand, DropDown, ErrorResponse, LiteralValue,
    MetaResponse, ParameterControls, ParameterValue, PartialResponse, Section, SettingsResponse,
    Slider, Tab, TextArea, TextField, ToggleSwitch, ValueNamePair,
};
pub use tool::{
    ToolCallDefinition, ToolCallDefinitionDelta, ToolCallFunction, ToolCallFunctionDelta,
    ToolDefinition, ToolFunctionDefinition, ToolResultDefinition, ToolRole,
};
