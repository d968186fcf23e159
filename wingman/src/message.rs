//! Conversation message types.
//!
//! [`Message`] is the one internal representation of a conversation turn.
//! Vendor wire formats are produced from it only inside the provider
//! adapters, so the history never depends on a particular backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ephemeral system context, never stored in history.
    System,
    /// The human speaking to the wingman.
    User,
    /// The model.
    Assistant,
    /// A tool response answering one tool call.
    Tool,
}

/// Arguments of a tool call as returned by a provider.
///
/// Most backends send a JSON-encoded string, some send the object itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Arguments already decoded into an object.
    Structured(Map<String, Value>),
    /// Arguments as a raw JSON string.
    Json(String),
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Structured(Map::new())
    }
}

impl ToolArguments {
    /// Decode the arguments into a JSON object.
    ///
    /// An empty string or `null` decodes to an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the string is not valid
    /// JSON or does not encode an object.
    pub fn parse(&self) -> Result<Map<String, Value>, ToolError> {
        match self {
            Self::Structured(map) => Ok(map.clone()),
            Self::Json(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Self::Json(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                Value::Null => Ok(Map::new()),
                other => Err(ToolError::invalid_args(format!(
                    "expected a JSON object, got {other}"
                ))),
            },
        }
    }

    /// Encode the arguments as a JSON string, the shape most backends expect.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        match self {
            Self::Structured(map) => Value::Object(map.clone()).to_string(),
            Self::Json(raw) => raw.clone(),
        }
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        Self::Structured(map)
    }
}

/// A model-issued request to invoke a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier; empty when the backend did not issue one.
    #[serde(default)]
    pub id: String,
    /// Name of the function to invoke.
    pub function_name: String,
    /// Raw arguments, repaired before dispatch if necessary.
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Create a new tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: impl Into<ToolArguments>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments: arguments.into(),
        }
    }

    /// Whether the backend issued an id for this call.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Text content. Always a string, possibly empty.
    #[serde(default)]
    pub content: String,
    /// Tool calls, only on assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the answered call, only on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Function name of the answered call, only on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create an assistant message without tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls.
    ///
    /// An empty call list is stored as `None` so strict backends do not see
    /// an empty `tool_calls` array.
    #[must_use]
    pub fn assistant_with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::plain(Role::Assistant, content);
        if !calls.is_empty() {
            msg.tool_calls = Some(calls);
        }
        msg
    }

    /// Create a tool response for the given call.
    #[must_use]
    pub fn tool(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut msg = Self::plain(Role::Tool, content);
        if call.has_id() {
            msg.tool_call_id = Some(call.id.clone());
        }
        if !call.function_name.is_empty() {
            msg.name = Some(call.function_name.clone());
        }
        msg
    }

    /// Tool calls of this message, empty for anything but assistant turns.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Whether this is an assistant message with at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Whether this assistant message issued the call with the given id.
    #[must_use]
    pub fn issued_tool_call(&self, id: &str) -> bool {
        self.role == Role::Assistant && self.tool_calls().iter().any(|c| c.id == id)
    }

    /// Whether this is the tool response for the given call id.
    #[must_use]
    pub fn answers_tool_call(&self, id: &str) -> bool {
        self.role == Role::Tool && self.tool_call_id.as_deref() == Some(id)
    }
}
