//! Pluggable skills.
//!
//! A [`Skill`] contributes tools and prompt text to a wingman and may hook
//! into the conversation. Only [`Skill::name`], [`Skill::tools`] and
//! [`Skill::execute_tool`] are required; every hook has a neutral default.
//!
//! The [`SkillHost`] owns the skills of one wingman, tracks which skill owns
//! which tool and isolates failures of individual hooks.

pub mod host;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::SoundConfig;
use crate::error::{InitializationError, Result, ToolError};
use crate::message::ToolCall;
use crate::provider::SecretSource;
use crate::tool::ToolDefinition;

pub use host::SkillHost;

/// Result of a skill tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillOutput {
    /// Text reported to the model as the tool response.
    pub response: String,
    /// Text spoken to the user right away, ending the turn.
    pub instant_response: Option<String>,
}

impl SkillOutput {
    /// A plain tool response.
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            instant_response: None,
        }
    }

    /// Also speak `text` immediately.
    #[must_use]
    pub fn with_instant_response(mut self, text: impl Into<String>) -> Self {
        self.instant_response = Some(text.into());
        self
    }
}

/// A capability module attached to a wingman.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Display name, also the heading of its prompt section.
    fn name(&self) -> &str;

    /// Tools this skill handles.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Run one of this skill's tools.
    async fn execute_tool(
        &self,
        tool: &str,
        args: &Map<String, Value>,
    ) -> std::result::Result<SkillOutput, ToolError>;

    /// Check prerequisites. Any error keeps the wingman from starting.
    async fn validate(
        &self,
        _wingman: &str,
        _secrets: &dyn SecretSource,
    ) -> Vec<InitializationError> {
        Vec::new()
    }

    /// Called once after validation succeeded.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the wingman is torn down.
    async fn unload(&self) {}

    /// Text appended to the system context under the skill name.
    async fn prompt(&self) -> Option<String> {
        None
    }

    /// Called before a user message is appended.
    async fn on_add_user_message(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    /// Called before an assistant message is appended.
    async fn on_add_assistant_message(&self, _content: &str, _tool_calls: &[ToolCall]) -> Result<()> {
        Ok(())
    }

    /// Whether interim speech should play while `tool` runs.
    async fn is_waiting_response_needed(&self, _tool: &str) -> bool {
        true
    }

    /// Whether the model must be called again after `tool` returned.
    async fn is_summarize_needed(&self, _tool: &str) -> bool {
        true
    }

    /// Rewrite text before it is spoken.
    async fn on_play_to_user(&self, text: String, _sound: &SoundConfig) -> Result<String> {
        Ok(text)
    }
}
