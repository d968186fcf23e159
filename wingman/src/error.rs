//! Unified error types for the wingman runtime.
//!
//! This module provides the error hierarchy covering:
//! - Provider gateway errors (authentication, rate limiting, transport)
//! - Tool and skill execution errors
//! - Startup validation errors, collected as [`InitializationError`] lists

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result type alias for wingman operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the wingman runtime.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Provider gateway error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Tool or skill execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// The wingman failed validation and cannot start.
    #[error("Wingman failed to initialize with {} error(s)", .0.len())]
    Initialization(Vec<InitializationError>),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Error type for provider gateway calls.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ProviderError {
    /// The error kind.
    pub kind: ProviderErrorKind,
    /// The provider name (e.g., "openai", "groq").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// HTTP status returned by the backend, if any.
    pub status: Option<u16>,
}

/// Categories of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit or quota exceeded.
    RateLimited,
    /// Network or connection error.
    Network,
    /// Non-success HTTP status.
    HttpStatus,
    /// The backend answered with something we could not interpret.
    ResponseFormat,
    /// The request was rejected as malformed.
    InvalidRequest,
    /// Provider-specific error.
    Provider,
}

impl ProviderError {
    fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            message: message.into(),
            status: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, message).with_provider(provider)
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self::new(
            ProviderErrorKind::RateLimited,
            "Rate limit exceeded. Please retry after some time.",
        )
        .with_provider(provider)
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let mut err = Self::new(
            ProviderErrorKind::HttpStatus,
            format!("HTTP {status}: {}", body.into()),
        );
        err.status = Some(status);
        err
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ResponseFormat, message)
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Provider, message).with_provider(provider)
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Check if this is a transient error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Network
        )
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::response_format(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error type for tool dispatch and skill execution.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// Arguments could not be parsed or are missing required fields.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No command or skill handles this tool.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The handler ran and failed.
    #[error("Tool '{tool}' failed: {message}")]
    Execution {
        /// Tool that failed.
        tool: String,
        /// Failure description.
        message: String,
    },
}

impl ToolError {
    /// Create an execution error.
    #[must_use]
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

/// Category of a startup validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitializationErrorKind {
    /// A required API key or other secret is not available.
    MissingSecret,
    /// The configuration is inconsistent or incomplete.
    InvalidConfig,
    /// Anything else that went wrong while validating.
    Unknown,
}

impl fmt::Display for InitializationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingSecret => "MISSING_SECRET",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A typed validation error that prevents one wingman from starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{wingman_name}] {kind}: {message}")]
pub struct InitializationError {
    /// Wingman the error belongs to.
    pub wingman_name: String,
    /// Human-readable description.
    pub message: String,
    /// Error category.
    #[serde(rename = "error_type")]
    pub kind: InitializationErrorKind,
    /// Name of the missing secret, for [`InitializationErrorKind::MissingSecret`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl InitializationError {
    /// Create a missing secret error.
    #[must_use]
    pub fn missing_secret(wingman: impl Into<String>, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            wingman_name: wingman.into(),
            message: format!("Missing secret '{secret}'."),
            kind: InitializationErrorKind::MissingSecret,
            secret_name: Some(secret),
        }
    }

    /// Create an invalid config error.
    #[must_use]
    pub fn invalid_config(wingman: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            wingman_name: wingman.into(),
            message: message.into(),
            kind: InitializationErrorKind::InvalidConfig,
            secret_name: None,
        }
    }

    /// Create an error of unknown category.
    #[must_use]
    pub fn unknown(wingman: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            wingman_name: wingman.into(),
            message: message.into(),
            kind: InitializationErrorKind::Unknown,
            secret_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_kind_serializes_screaming_case() {
        let err = InitializationError::missing_secret("atc", "openai");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error_type"], "MISSING_SECRET");
        assert_eq!(json["secret_name"], "openai");
        assert_eq!(err.to_string(), "[atc] MISSING_SECRET: Missing secret 'openai'.");
    }

    #[test]
    fn provider_error_display_and_retry() {
        let err = ProviderError::rate_limited("groq");
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("[groq] "));

        let err = ProviderError::http_status(401, "bad key");
        assert_eq!(err.status, Some(401));
        assert!(!err.is_retryable());
    }

    #[test]
    fn initialization_error_counts_in_display() {
        let err = Error::Initialization(vec![
            InitializationError::invalid_config("a", "x"),
            InitializationError::unknown("a", "y"),
        ]);
        assert_eq!(err.to_string(), "Wingman failed to initialize with 2 error(s)");
    }
}
