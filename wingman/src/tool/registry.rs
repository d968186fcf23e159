//! Dispatch of tool calls to commands and skills.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{COMMAND_NAME_ARG, COMMAND_OK, EXECUTE_COMMAND, SKILL_ERROR_RESPONSE, ToolDefinition};
use crate::command::{Command, CommandExecutor, CommandRegistry};
use crate::events::{EventSink, WingmanEvent};
use crate::skill::SkillHost;
use crate::telemetry::Benchmark;

/// Outcome of resolving one tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResolution {
    /// Text recorded as the tool response for the model.
    pub response: String,
    /// Text to speak right away; ends the turn without another model call.
    pub instant_response: Option<String>,
    /// Skill that handled the call.
    pub skill: Option<String>,
}

impl ToolResolution {
    fn response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }
}

/// Maps function names to the built-in command tool or an owning skill.
pub struct ToolRegistry {
    wingman: String,
    commands: Arc<CommandRegistry>,
    executor: Arc<dyn CommandExecutor>,
    skills: Arc<SkillHost>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("wingman", &self.wingman)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Create a registry.
    #[must_use]
    pub fn new(
        wingman: impl Into<String>,
        commands: Arc<CommandRegistry>,
        executor: Arc<dyn CommandExecutor>,
        skills: Arc<SkillHost>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            wingman: wingman.into(),
            commands,
            executor,
            skills,
            events,
        }
    }

    /// Configured commands.
    #[must_use]
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Tools offered to the model: `execute_command` first, then skill tools.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = vec![ToolDefinition::execute_command(
            &self.commands.tool_command_names(),
        )];
        tools.extend(self.skills.definitions().await);
        tools
    }

    /// Run a command through the executor.
    ///
    /// Executor failures are logged; the command still counts as executed
    /// for the conversation.
    pub async fn execute_command(&self, command: &Command, is_instant: bool) {
        info!(wingman = %self.wingman, command = %command.name, is_instant, "executing command");
        if let Err(e) = self.executor.execute(command, is_instant).await {
            warn!(wingman = %self.wingman, command = %command.name, error = %e, "command execution failed");
            self.events.emit(WingmanEvent::Error {
                wingman: self.wingman.clone(),
                message: e.to_string(),
            });
        }
        self.events.emit(WingmanEvent::CommandExecuted {
            wingman: self.wingman.clone(),
            command: command.name.clone(),
            instant: is_instant,
        });
    }

    /// Resolve one tool call.
    ///
    /// `execute_command` always reports `"Ok"` for a known command and picks
    /// one of its responses as instant speech. Skill tools are timed and a
    /// failing skill yields `"ERROR DURING PROCESSING"`.
    pub async fn resolve(&self, function_name: &str, args: &Map<String, Value>) -> ToolResolution {
        if function_name == EXECUTE_COMMAND {
            return self.resolve_command(args).await;
        }

        let Some(skill) = self.skills.skill_for_tool(function_name).await else {
            warn!(wingman = %self.wingman, tool = function_name, "no handler for tool");
            return ToolResolution::response(format!("Tool '{function_name}' not found."));
        };

        let skill_name = skill.name().to_string();
        self.events.emit(WingmanEvent::SkillStarted {
            wingman: self.wingman.clone(),
            skill: skill_name.clone(),
            tool: function_name.to_string(),
        });
        let benchmark = Benchmark::new(format!("Processing Skill '{skill_name}'"));
        let result = skill.execute_tool(function_name, args).await;
        let elapsed_ms = u64::try_from(benchmark.elapsed().as_millis()).unwrap_or(u64::MAX);
        let elapsed = benchmark.finish();
        debug!(
            skill = %skill_name,
            tool = function_name,
            elapsed = %elapsed.formatted_execution_time,
            "skill tool finished"
        );
        self.events.emit(WingmanEvent::SkillFinished {
            wingman: self.wingman.clone(),
            skill: skill_name.clone(),
            tool: function_name.to_string(),
            elapsed_ms,
            failed: result.is_err(),
        });

        match result {
            Ok(output) => ToolResolution {
                response: output.response,
                instant_response: output.instant_response.filter(|s| !s.is_empty()),
                skill: Some(skill_name),
            },
            Err(e) => {
                warn!(skill = %skill_name, tool = function_name, error = %e, "skill tool failed");
                self.events.emit(WingmanEvent::Error {
                    wingman: self.wingman.clone(),
                    message: format!("Error while processing Skill '{skill_name}': {e}"),
                });
                ToolResolution::response(SKILL_ERROR_RESPONSE)
            }
        }
    }

    async fn resolve_command(&self, args: &Map<String, Value>) -> ToolResolution {
        let name = args
            .get(COMMAND_NAME_ARG)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(command) = self.commands.get(name) else {
            warn!(wingman = %self.wingman, command = name, "model asked for an unknown command");
            return ToolResolution::response(format!("Command '{name}' not found."));
        };

        self.execute_command(command, false).await;
        ToolResolution {
            response: COMMAND_OK.to_string(),
            instant_response: command.pick_response().map(str::to_string),
            skill: None,
        }
    }
}
