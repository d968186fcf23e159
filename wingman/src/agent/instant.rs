//! Instant activation: transcripts that trigger commands without the model.

use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use super::Wingman;
use crate::command::Command;
use crate::message::ToolCall;
use crate::provider::Completion;
use crate::tool::{COMMAND_NAME_ARG, EXECUTE_COMMAND};

/// Tool response stored for commands run by instant activation.
pub(crate) const INSTANT_COMMAND_OK: &str = "OK";

/// Response value meaning "say nothing".
const SILENT_RESPONSE: &str = ".";

/// Result of the instant activation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InstantActivation {
    /// No command matched the transcript.
    NotMatched,
    /// Commands ran and every one had a response. `None` means the
    /// responses asked for silence.
    Responded(Option<String>),
    /// Commands ran but at least one has no response; the model should
    /// answer without tools.
    Executed,
}

impl Wingman {
    /// Run the commands matching `transcript` and record them as a synthetic
    /// assistant tool-call turn.
    pub(crate) async fn try_instant_activation(&self, transcript: &str) -> InstantActivation {
        let commands: Vec<Command> = self
            .tools
            .commands()
            .match_instant_activation(transcript)
            .into_iter()
            .cloned()
            .collect();
        if commands.is_empty() {
            return InstantActivation::NotMatched;
        }

        info!(
            wingman = %self.name(),
            commands = ?commands.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "instant activation"
        );
        for command in &commands {
            self.tools.execute_command(command, true).await;
        }
        self.add_forced_command_calls(&commands).await;

        let responses: Vec<&str> = commands.iter().filter_map(Command::pick_response).collect();
        if responses.len() != commands.len() {
            return InstantActivation::Executed;
        }
        InstantActivation::Responded(join_responses(&responses))
    }

    async fn add_forced_command_calls(&self, commands: &[Command]) {
        let calls: Vec<ToolCall> = commands
            .iter()
            .map(|command| {
                let mut args = Map::new();
                args.insert(COMMAND_NAME_ARG.to_string(), Value::String(command.name.clone()));
                ToolCall::new(
                    format!("call_{}", Uuid::new_v4().simple()),
                    EXECUTE_COMMAND,
                    args,
                )
            })
            .collect();

        let mut completion = Completion::with_tool_calls("", calls);
        self.add_assistant_response(&mut completion).await;
        for call in &completion.tool_calls {
            self.update_tool_response(&call.id, INSTANT_COMMAND_OK).await;
        }
    }
}

/// Drop duplicates, end each response with a period and join them.
fn join_responses(responses: &[&str]) -> Option<String> {
    let mut unique: Vec<String> = Vec::new();
    for response in responses {
        let response = if response.ends_with('.') {
            (*response).to_string()
        } else {
            format!("{response}.")
        };
        if !unique.contains(&response) {
            unique.push(response);
        }
    }
    let joined = unique.join(" ");
    (joined != SILENT_RESPONSE).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_are_deduplicated_and_terminated() {
        assert_eq!(
            join_responses(&["Sure thing", "Roger.", "Sure thing"]).as_deref(),
            Some("Sure thing. Roger.")
        );
    }

    #[test]
    fn a_lone_period_means_silence() {
        assert_eq!(join_responses(&["."]), None);
        assert_eq!(join_responses(&[".", "."]), None);
        assert_eq!(join_responses(&[".", "Done"]).as_deref(), Some(". Done."));
    }
}
