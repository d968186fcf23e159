//! Wingman configuration.
//!
//! A [`WingmanConfig`] is read from JSON. Every section has serde defaults
//! so a minimal file only needs a name, a system prompt and a provider.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, InitializationError, Result};

/// Placeholder in the system prompt replaced by the backstory.
pub const BACKSTORY_PLACEHOLDER: &str = "{backstory}";
/// Placeholder in the system prompt replaced by the skill prompts.
pub const SKILLS_PLACEHOLDER: &str = "{skills}";

/// Configuration of one wingman.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WingmanConfig {
    /// Display name, used in logs and errors.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Prompt templates.
    #[serde(default)]
    pub prompts: PromptConfig,
    /// Behaviour switches.
    #[serde(default)]
    pub features: FeaturesConfig,
    /// Audio output settings.
    #[serde(default)]
    pub sound: SoundConfig,
    /// Locally executed commands.
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Static interim phrases spoken while tools run.
    #[serde(default)]
    pub filler_responses: Vec<String>,
    /// Completion backend.
    pub provider: ProviderConfig,
}

/// Prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System prompt, may contain `{backstory}` and `{skills}`.
    #[serde(default)]
    pub system_prompt: String,
    /// Persona backstory inserted at `{backstory}`.
    #[serde(default)]
    pub backstory: Option<String>,
}

/// Behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Number of user turns kept in the history, all when unset.
    #[serde(default)]
    pub remember_messages: Option<usize>,
    /// Ask the provider for generic filler phrases on startup.
    #[serde(default)]
    pub use_generic_instant_responses: bool,
    /// Upper bound on provider calls within one turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

const fn default_max_tool_rounds() -> usize {
    10
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            remember_messages: None,
            use_generic_instant_responses: false,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// Audio output settings passed through to the audio collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Playback volume, `0.0` mutes speech entirely.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Play a beep before and after speech.
    #[serde(default)]
    pub play_beep: bool,
    /// Named audio effects applied by the player.
    #[serde(default)]
    pub effects: Vec<String>,
}

const fn default_volume() -> f32 {
    1.0
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            play_beep: false,
            effects: Vec::new(),
        }
    }
}

impl SoundConfig {
    /// Whether speech is muted.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.volume <= 0.0
    }
}

/// Supported OpenAI-compatible completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `OpenAI`.
    Openai,
    /// Mistral.
    Mistral,
    /// Groq.
    Groq,
    /// Cerebras.
    Cerebras,
    /// `OpenRouter`.
    Openrouter,
    /// A local OpenAI-compatible server such as LM Studio.
    LocalLlm,
    /// Perplexity.
    Perplexity,
}

impl ProviderKind {
    /// Identifier used in logs and secret names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Mistral => "mistral",
            Self::Groq => "groq",
            Self::Cerebras => "cerebras",
            Self::Openrouter => "openrouter",
            Self::LocalLlm => "local_llm",
            Self::Perplexity => "perplexity",
        }
    }

    /// Base URL used when the config has no endpoint.
    #[must_use]
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Cerebras => "https://api.cerebras.ai/v1",
            Self::Openrouter => "https://openrouter.ai/api/v1",
            Self::LocalLlm => "http://localhost:1234/v1",
            Self::Perplexity => "https://api.perplexity.ai",
        }
    }

    /// Secret holding the API key, `None` for keyless local servers.
    #[must_use]
    pub const fn secret_name(self) -> Option<&'static str> {
        match self {
            Self::LocalLlm => None,
            other => Some(other.as_str()),
        }
    }
}

/// Completion backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend kind.
    pub kind: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Overrides [`ProviderKind::default_endpoint`].
    #[serde(default)]
    pub endpoint: Option<String>,
    /// `OpenAI` organization header.
    #[serde(default)]
    pub organization: Option<String>,
    /// Whether the model accepts tool definitions.
    #[serde(default = "default_supports_tools")]
    pub supports_tools: bool,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

const fn default_supports_tools() -> bool {
    true
}

impl ProviderConfig {
    /// Create a config for `kind` and `model` with defaults elsewhere.
    #[must_use]
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            endpoint: None,
            organization: None,
            supports_tools: true,
            timeout_secs: None,
        }
    }

    /// The configured endpoint or the default one for the kind.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
    }
}

impl WingmanConfig {
    /// Create a config with a name, a system prompt and a provider.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prompts: PromptConfig {
                system_prompt: system_prompt.into(),
                backstory: None,
            },
            features: FeaturesConfig::default(),
            sound: SoundConfig::default(),
            commands: Vec::new(),
            filler_responses: Vec::new(),
            provider,
        }
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`]
    /// if it is not a valid config.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), wingman = %config.name, "loaded wingman config");
        Ok(config)
    }

    /// Parse a config from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the string is not a valid config.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    /// Check the config for inconsistencies that prevent a start.
    #[must_use]
    pub fn validate(&self) -> Vec<InitializationError> {
        let mut errors = Vec::new();
        let name = if self.name.trim().is_empty() {
            errors.push(InitializationError::invalid_config(
                "",
                "Wingman name must not be empty.",
            ));
            "<unnamed>"
        } else {
            self.name.as_str()
        };

        if self.prompts.system_prompt.trim().is_empty() {
            errors.push(InitializationError::invalid_config(
                name,
                "System prompt must not be empty.",
            ));
        }
        if self.provider.model.trim().is_empty() {
            errors.push(InitializationError::invalid_config(
                name,
                "Provider model must not be empty.",
            ));
        }

        let mut seen = HashSet::new();
        for command in &self.commands {
            if !seen.insert(command.name.as_str()) {
                errors.push(InitializationError::invalid_config(
                    name,
                    format!("Command '{}' is defined more than once.", command.name),
                ));
            }
            if command.force_instant_activation && command.instant_activation.is_empty() {
                errors.push(InitializationError::invalid_config(
                    name,
                    format!(
                        "Command '{}' forces instant activation but has no activation phrase.",
                        command.name
                    ),
                ));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InitializationErrorKind;

    const MINIMAL: &str = r#"{
        "name": "ATC",
        "prompts": { "system_prompt": "You are {backstory}.{skills}" },
        "provider": { "kind": "groq", "model": "llama-3.3-70b" }
    }"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = WingmanConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.features.max_tool_rounds, 10);
        assert_eq!(config.features.remember_messages, None);
        assert!((config.sound.volume - 1.0).abs() < f32::EPSILON);
        assert!(config.provider.supports_tools);
        assert_eq!(config.provider.endpoint(), "https://api.groq.com/openai/v1");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn commands_deserialize() {
        let config = WingmanConfig::from_json(
            r#"{
                "name": "Board",
                "prompts": { "system_prompt": "x" },
                "provider": { "kind": "local_llm", "model": "m", "endpoint": "http://box:8080/v1" },
                "commands": [
                    { "name": "RadioOn", "instant_activation": ["turn on radio"],
                      "responses": ["Sure thing"], "force_instant_activation": true }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.commands[0].responses, ["Sure thing"]);
        assert!(config.commands[0].force_instant_activation);
        assert_eq!(config.provider.endpoint(), "http://box:8080/v1");
        assert_eq!(config.provider.kind.secret_name(), None);
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut config = WingmanConfig::new("", " ", ProviderConfig::new(ProviderKind::Openai, "gpt-4o"));
        config.commands = vec![
            Command::new("A"),
            Command::new("A"),
            Command::new("B").force_instant(),
        ];
        let errors = config.validate();
        assert_eq!(errors.len(), 4);
        assert!(
            errors
                .iter()
                .all(|e| e.kind == InitializationErrorKind::InvalidConfig)
        );
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = WingmanConfig::load("/definitely/not/here.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
