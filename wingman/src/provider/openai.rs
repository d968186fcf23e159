//! Chat Completions gateway for OpenAI-compatible backends.
//!
//! `OpenAI`, Mistral, Groq, Cerebras, `OpenRouter`, Perplexity and local
//! servers such as LM Studio all accept the same request shape. Wire structs
//! live here and nowhere else.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Completion, Provider, TokenUsage};
use crate::config::ProviderKind;
use crate::error::ProviderError;
use crate::message::{Message, Role, ToolArguments, ToolCall};
use crate::tool::ToolDefinition;

/// Header carrying the `OpenAI` organization id.
const ORGANIZATION_HEADER: &str = "openai-organization";

/// Gateway for one model on one OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatible {
    name: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    organization: Option<String>,
    supports_tools: bool,
    http_client: reqwest::Client,
}

impl fmt::Debug for OpenAiCompatible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatible")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatible {
    /// Start building a gateway named `name` for `model`.
    #[must_use]
    pub fn builder(name: impl Into<String>, model: impl Into<String>) -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder {
            name: name.into(),
            model: model.into(),
            base_url: None,
            api_key: None,
            organization: None,
            timeout_secs: None,
            supports_tools: true,
        }
    }

    /// Model identifier sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        if let Some(key) = &self.api_key
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}"))
        {
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(org) = &self.organization
            && let Ok(value) = HeaderValue::from_str(org)
        {
            headers.insert(ORGANIZATION_HEADER, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> ChatRequest<'a> {
        let tools: Vec<WireTool<'a>> = if self.supports_tools {
            tools
                .iter()
                .map(|function| WireTool {
                    kind: "function",
                    function,
                })
                .collect()
        } else {
            Vec::new()
        };
        ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
        }
    }

    fn error_for_status(&self, status: StatusCode, body: String) -> ProviderError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::auth(&self.name, body),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(&self.name),
            _ => ProviderError::http_status(status.as_u16(), body).with_provider(&self.name),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    #[instrument(skip(self, messages, tools), fields(provider = %self.name, model = %self.model))]
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ProviderError> {
        let body = self.build_request(messages, tools);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).with_provider(&self.name))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.error_for_status(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from(e).with_provider(&self.name))?;
        parsed
            .into_completion()
            .map_err(|e| e.with_provider(&self.name))
    }
}

/// Builder for [`OpenAiCompatible`].
#[derive(Debug)]
pub struct OpenAiCompatibleBuilder {
    name: String,
    model: String,
    base_url: Option<String>,
    api_key: Option<String>,
    organization: Option<String>,
    timeout_secs: Option<u64>,
    supports_tools: bool,
}

impl OpenAiCompatibleBuilder {
    /// Set the base URL, e.g. `https://api.openai.com/v1`.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the bearer API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the organization header.
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Whether tool definitions are forwarded.
    #[must_use]
    pub const fn supports_tools(mut self, supports_tools: bool) -> Self {
        self.supports_tools = supports_tools;
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be created.
    pub fn build(self) -> Result<OpenAiCompatible, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let http_client = builder.build()?;

        Ok(OpenAiCompatible {
            base_url: self
                .base_url
                .unwrap_or_else(|| ProviderKind::Openai.default_endpoint().to_string()),
            name: self.name,
            model: self.model,
            api_key: self.api_key,
            organization: self.organization,
            supports_tools: self.supports_tools,
            http_client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls = message.has_tool_calls().then(|| {
            message
                .tool_calls()
                .iter()
                .map(|call| WireToolCall {
                    id: &call.id,
                    kind: "function",
                    function: WireFunctionCall {
                        name: &call.function_name,
                        arguments: call.arguments.to_json_string(),
                    },
                })
                .collect()
        });
        Self {
            role: message.role,
            content: &message.content,
            tool_calls,
            tool_call_id: message.tool_call_id.as_deref(),
            name: message.name.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Option<ToolArguments>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_completion(self) -> Result<Completion, ProviderError> {
        let Some(choice) = self.choices.into_iter().next() else {
            return Err(ProviderError::response_format("response contained no choices"));
        };
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id.unwrap_or_default(),
                function_name: call.function.name,
                arguments: call.function.arguments.unwrap_or_default(),
            })
            .collect();
        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: self.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}
