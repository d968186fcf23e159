//! Normalisation of malformed tool calls.
//!
//! Models sometimes call a command directly, using its name as the function
//! name, instead of going through `execute_command`. Such calls are
//! rewritten to the canonical form before dispatch.

use serde_json::{Map, Value};
use tracing::debug;

use super::{COMMAND_NAME_ARG, EXECUTE_COMMAND};
use crate::command::CommandRegistry;
use crate::message::{ToolArguments, ToolCall};

/// Rewrite command-as-function calls in place.
///
/// A call is rewritten when it has no arguments and its function name is a
/// command, or when its only argument is `command_name` naming a command
/// equal to the function name. Calls whose arguments do not parse are left
/// alone. Returns the function names that were rewritten.
pub fn repair_tool_calls(calls: &mut [ToolCall], commands: &CommandRegistry) -> Vec<String> {
    let mut repaired = Vec::new();
    for call in calls.iter_mut() {
        if call.function_name == EXECUTE_COMMAND {
            continue;
        }
        let Ok(args) = call.arguments.parse() else {
            continue;
        };
        if !needs_repair(&call.function_name, &args, commands) {
            continue;
        }

        let mut fixed = Map::new();
        fixed.insert(
            COMMAND_NAME_ARG.to_string(),
            Value::String(call.function_name.clone()),
        );
        debug!(function = %call.function_name, "applied command call fix");
        repaired.push(std::mem::replace(
            &mut call.function_name,
            EXECUTE_COMMAND.to_string(),
        ));
        call.arguments = ToolArguments::Structured(fixed);
    }
    repaired
}

fn needs_repair(function_name: &str, args: &Map<String, Value>, commands: &CommandRegistry) -> bool {
    if args.is_empty() {
        return commands.contains(function_name);
    }
    if args.len() != 1 {
        return false;
    }
    args.get(COMMAND_NAME_ARG)
        .and_then(Value::as_str)
        .is_some_and(|name| name == function_name && commands.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn commands() -> CommandRegistry {
        CommandRegistry::new(vec![Command::new("LandingGear"), Command::new("Lights")])
    }

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall::new("id", name, ToolArguments::Json(args.to_string()))
    }

    #[test]
    fn zero_arg_command_call_is_rewritten() {
        let mut calls = vec![call("LandingGear", "{}")];
        let repaired = repair_tool_calls(&mut calls, &commands());
        assert_eq!(repaired, ["LandingGear"]);
        assert_eq!(calls[0].function_name, EXECUTE_COMMAND);
        assert_eq!(calls[0].arguments.parse().unwrap()["command_name"], "LandingGear");
        assert_eq!(calls[0].id, "id");
    }

    #[test]
    fn redundant_command_name_is_rewritten() {
        let mut calls = vec![call("Lights", r#"{"command_name":"Lights"}"#)];
        assert_eq!(repair_tool_calls(&mut calls, &commands()).len(), 1);
        assert_eq!(calls[0].function_name, EXECUTE_COMMAND);
    }

    #[test]
    fn other_calls_are_untouched() {
        let mut calls = vec![
            call("Lights", r#"{"command_name":"LandingGear"}"#),
            call("set_timer", "{}"),
            call("Lights", r#"{"brightness": 3}"#),
            call("Lights", "{oops"),
            call(EXECUTE_COMMAND, r#"{"command_name":"Lights"}"#),
        ];
        let before = calls.clone();
        assert!(repair_tool_calls(&mut calls, &commands()).is_empty());
        assert_eq!(calls, before);
    }
}
