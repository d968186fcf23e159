//! Tools offered to the model and their dispatch.
//!
//! The model sees one built-in tool, `execute_command`, plus whatever the
//! prepared skills contribute. [`ToolRegistry`] maps a returned call back to
//! a command or to the skill that owns the function name.

pub mod registry;
pub mod repair;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use registry::{ToolRegistry, ToolResolution};
pub use repair::repair_tool_calls;

/// Name of the built-in tool that runs a configured command.
pub const EXECUTE_COMMAND: &str = "execute_command";

/// Argument of [`EXECUTE_COMMAND`] naming the command.
pub const COMMAND_NAME_ARG: &str = "command_name";

/// Response reported to the model for an executed command.
pub const COMMAND_OK: &str = "Ok";

/// Response recorded when a skill tool fails.
pub const SKILL_ERROR_RESPONSE: &str = "ERROR DURING PROCESSING";

/// Response recorded when a tool call could not be processed at all.
pub const TOOL_ERROR_RESPONSE: &str = "Error";

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name.
    pub name: String,
    /// What the function does, shown to the model.
    pub description: String,
    /// JSON schema of the arguments.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    /// Create a tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Definition of [`EXECUTE_COMMAND`] restricted to the given names.
    #[must_use]
    pub fn execute_command(command_names: &[String]) -> Self {
        Self::new(
            EXECUTE_COMMAND,
            "Executes a command",
            json!({
                "type": "object",
                "properties": {
                    COMMAND_NAME_ARG: {
                        "type": "string",
                        "description": "The name of the command to execute",
                        "enum": command_names,
                    }
                },
                "required": [COMMAND_NAME_ARG],
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_command_enumerates_names() {
        let def = ToolDefinition::execute_command(&["Lights".into(), "Gear".into()]);
        assert_eq!(def.name, EXECUTE_COMMAND);
        assert_eq!(
            def.parameters["properties"]["command_name"]["enum"],
            json!(["Lights", "Gear"])
        );
        assert_eq!(def.parameters["required"], json!(["command_name"]));
    }

    #[test]
    fn parameters_default_to_empty_object() {
        let def: ToolDefinition =
            serde_json::from_value(json!({"name": "ping", "description": "Ping"})).unwrap();
        assert_eq!(def.parameters["type"], "object");
    }
}
