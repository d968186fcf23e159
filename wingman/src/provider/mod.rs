//! Completion backends.
//!
//! The conversation core only talks to the [`Provider`] trait. Each backend
//! translates [`Message`]s and [`ToolDefinition`]s into its own wire format
//! and normalises the answer into a [`Completion`].

pub mod mock;
pub mod openai;
pub mod secrets;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{InitializationError, ProviderError};
use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;

pub use openai::OpenAiCompatible;
pub use secrets::{EnvSecrets, SecretSource, StaticSecrets};

/// Token usage reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total token count.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A normalised model answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Text content, empty when the model only called tools.
    pub content: String,
    /// Tool calls in the order the model issued them.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, if reported.
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// A plain text answer.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// An answer carrying tool calls.
    #[must_use]
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            usage: None,
        }
    }
}

/// A completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Whether tool definitions may be sent to this backend.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Ask for the next message given the full conversation.
    ///
    /// `tools` is empty when tool calls are not allowed for this request.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ProviderError>;
}

/// Build the backend configured for a wingman.
///
/// # Errors
///
/// Returns a `MISSING_SECRET` error when the backend needs an API key the
/// secret source does not have, or `UNKNOWN` when the HTTP client cannot be
/// built.
pub fn from_config(
    wingman: &str,
    config: &ProviderConfig,
    secrets: &dyn SecretSource,
) -> Result<Arc<dyn Provider>, InitializationError> {
    let api_key = match config.kind.secret_name() {
        Some(secret) => match secrets.secret(secret) {
            Some(key) => Some(key),
            None => return Err(InitializationError::missing_secret(wingman, secret)),
        },
        None => None,
    };

    let mut builder = OpenAiCompatible::builder(config.kind.as_str(), &config.model)
        .base_url(config.endpoint())
        .supports_tools(config.supports_tools);
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(org) = &config.organization {
        builder = builder.organization(org);
    }
    if let Some(timeout) = config.timeout_secs {
        builder = builder.timeout_secs(timeout);
    }

    let provider = builder
        .build()
        .map_err(|e| InitializationError::unknown(wingman, e.to_string()))?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::error::InitializationErrorKind;

    #[test]
    fn missing_key_is_reported_by_name() {
        let config = ProviderConfig::new(ProviderKind::Mistral, "mistral-large");
        let Err(err) = from_config("ATC", &config, &StaticSecrets::new()) else {
            panic!("expected missing secret");
        };
        assert_eq!(err.kind, InitializationErrorKind::MissingSecret);
        assert_eq!(err.secret_name.as_deref(), Some("mistral"));
    }

    #[test]
    fn local_backend_needs_no_key() {
        let config = ProviderConfig::new(ProviderKind::LocalLlm, "llama");
        let provider = from_config("ATC", &config, &StaticSecrets::new()).unwrap();
        assert_eq!(provider.name(), "local_llm");
        assert!(provider.supports_tools());
    }

    #[test]
    fn tool_support_follows_config() {
        let mut config = ProviderConfig::new(ProviderKind::Openrouter, "some/model");
        config.supports_tools = false;
        let secrets = StaticSecrets::new().with("openrouter", "key");
        let provider = from_config("ATC", &config, &secrets).unwrap();
        assert!(!provider.supports_tools());
    }

    #[test]
    fn usage_total_saturates() {
        let usage = TokenUsage {
            prompt_tokens: u32::MAX,
            completion_tokens: 1,
        };
        assert_eq!(usage.total(), u32::MAX);
    }
}
