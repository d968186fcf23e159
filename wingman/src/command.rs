//! Locally executed commands.
//!
//! Commands are configured per wingman. The model reaches them through the
//! built-in `execute_command` tool, or the transcript triggers them directly
//! through one of their instant activation phrases. What a command actually
//! does (key presses, audio, scripts) is left to a [`CommandExecutor`].

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;
use tracing::info;

use crate::error::ToolError;

/// Minimum similarity between a transcript and an instant activation phrase.
pub const INSTANT_ACTIVATION_CUTOFF: f32 = 0.8;

/// A configured command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique name, also the value of `command_name` in tool calls.
    pub name: String,
    /// Phrases that trigger the command without asking the model.
    #[serde(default)]
    pub instant_activation: Vec<String>,
    /// Pre-authored spoken responses, one picked at random.
    #[serde(default)]
    pub responses: Vec<String>,
    /// Only reachable by instant activation, hidden from the model.
    #[serde(default)]
    pub force_instant_activation: bool,
    /// Built-in command shipped with the runtime.
    #[serde(default)]
    pub is_system_command: bool,
    /// Opaque actions interpreted by the executor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Value>,
}

impl Command {
    /// Create a command with a name and nothing else.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instant_activation: Vec::new(),
            responses: Vec::new(),
            force_instant_activation: false,
            is_system_command: false,
            actions: Vec::new(),
        }
    }

    /// Add an instant activation phrase.
    #[must_use]
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.instant_activation.push(phrase.into());
        self
    }

    /// Add a spoken response.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.responses.push(response.into());
        self
    }

    /// Hide the command from the model.
    #[must_use]
    pub const fn force_instant(mut self) -> Self {
        self.force_instant_activation = true;
        self
    }

    /// Pick one of the configured responses at random.
    #[must_use]
    pub fn pick_response(&self) -> Option<&str> {
        if self.responses.is_empty() {
            return None;
        }
        Some(self.responses[fastrand::usize(..self.responses.len())].as_str())
    }
}

/// Carries out the side effects of a command.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command`. `is_instant` is set when the transcript triggered
    /// it directly rather than the model.
    async fn execute(&self, command: &Command, is_instant: bool) -> Result<(), ToolError>;
}

/// Executor that only records the execution in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCommandExecutor;

#[async_trait]
impl CommandExecutor for LoggingCommandExecutor {
    async fn execute(&self, command: &Command, is_instant: bool) -> Result<(), ToolError> {
        info!(
            command = %command.name,
            is_instant,
            actions = command.actions.len(),
            "Executing command"
        );
        Ok(())
    }
}

/// Name-indexed set of commands.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    by_name: HashMap<String, usize>,
    by_phrase: HashMap<String, Vec<usize>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.by_name.keys().collect::<Vec<_>>())
            .field("phrases", &self.by_phrase.len())
            .finish()
    }
}

impl CommandRegistry {
    /// Index the given commands. Later duplicates shadow earlier names.
    #[must_use]
    pub fn new(commands: Vec<Command>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_phrase: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, command) in commands.iter().enumerate() {
            by_name.insert(command.name.clone(), index);
            for phrase in &command.instant_activation {
                by_phrase
                    .entry(phrase.to_lowercase())
                    .or_default()
                    .push(index);
            }
        }
        Self {
            commands,
            by_name,
            by_phrase,
        }
    }

    /// Look up a command by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.by_name.get(name).map(|&i| &self.commands[i])
    }

    /// Whether a command with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All commands in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Whether no commands are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names the model may pass to `execute_command`.
    #[must_use]
    pub fn tool_command_names(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter(|c| !c.force_instant_activation)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Commands triggered by the transcript, if any phrase is close enough.
    ///
    /// The transcript is lower-cased and compared against every phrase by
    /// character diff ratio. The best phrase at or above
    /// [`INSTANT_ACTIVATION_CUTOFF`] wins, and all commands sharing it are
    /// returned.
    #[must_use]
    pub fn match_instant_activation(&self, transcript: &str) -> Vec<&Command> {
        let transcript = transcript.trim().to_lowercase();
        if transcript.is_empty() {
            return Vec::new();
        }

        let mut best: Option<(f32, &Vec<usize>)> = None;
        for (phrase, indices) in &self.by_phrase {
            let ratio = TextDiff::from_chars(transcript.as_str(), phrase.as_str()).ratio();
            if ratio < INSTANT_ACTIVATION_CUTOFF {
                continue;
            }
            if best.is_none_or(|(score, _)| ratio > score) {
                best = Some((ratio, indices));
            }
        }

        best.map(|(_, indices)| indices.iter().map(|&i| &self.commands[i]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(vec![
            Command::new("RadioOn")
                .with_phrase("turn on radio")
                .with_response("Sure thing")
                .force_instant(),
            Command::new("LandingGear")
                .with_phrase("gear down")
                .with_phrase("Lower the gear"),
            Command::new("Lights").with_phrase("gear down"),
        ])
    }

    #[test]
    fn lookup_by_name() {
        let registry = registry();
        assert!(registry.contains("Lights"));
        assert_eq!(registry.get("RadioOn").unwrap().responses, ["Sure thing"]);
        assert!(registry.get("radioon").is_none());
    }

    #[test]
    fn forced_commands_are_hidden_from_the_model() {
        assert_eq!(registry().tool_command_names(), ["LandingGear", "Lights"]);
    }

    #[test]
    fn exact_and_close_phrases_match() {
        let registry = registry();
        let hits = registry.match_instant_activation("Turn on radio");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "RadioOn");

        let hits = registry.match_instant_activation("turn on the radio");
        assert_eq!(hits[0].name, "RadioOn");
    }

    #[test]
    fn shared_phrase_triggers_every_command() {
        let registry = registry();
        let names: Vec<&str> = registry
            .match_instant_activation("gear down")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["LandingGear", "Lights"]);
    }

    #[test]
    fn distant_transcripts_do_not_match() {
        let registry = registry();
        assert!(registry.match_instant_activation("what is the weather like").is_empty());
        assert!(registry.match_instant_activation("   ").is_empty());
    }

    #[test]
    fn pick_response_from_configured_set() {
        let cmd = Command::new("x").with_response("a").with_response("b");
        for _ in 0..20 {
            assert!(matches!(cmd.pick_response(), Some("a" | "b")));
        }
        assert!(Command::new("y").pick_response().is_none());
    }

    #[tokio::test]
    async fn logging_executor_succeeds() {
        let cmd = Command::new("x");
        assert!(LoggingCommandExecutor.execute(&cmd, true).await.is_ok());
    }
}
