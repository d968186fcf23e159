//! Secret lookup for provider API keys and skills.

use std::collections::HashMap;

/// Source of named secrets such as API keys.
pub trait SecretSource: Send + Sync {
    /// Look up a secret by name, e.g. `"openai"`.
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads `<NAME>_API_KEY` from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl EnvSecrets {
    /// Environment variable holding the named secret.
    #[must_use]
    pub fn variable(name: &str) -> String {
        format!("{}_API_KEY", name.to_uppercase())
    }
}

impl SecretSource for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(Self::variable(name))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// In-memory secrets.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    secrets: HashMap<String, String>,
}

impl StaticSecrets {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }
}
