//! Assembly of a [`Wingman`] from its config and collaborators.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use super::Wingman;
use crate::audio::{AudioOutput, SilentOutput, Speaker};
use crate::command::{CommandExecutor, CommandRegistry, LoggingCommandExecutor};
use crate::config::WingmanConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, NoopEventSink};
use crate::filler::FillerResponder;
use crate::history::ConversationHistory;
use crate::provider::{self, EnvSecrets, Provider, SecretSource};
use crate::skill::{Skill, SkillHost};
use crate::tool::ToolRegistry;

/// Builder for [`Wingman`].
///
/// Only the config is required. Without an explicit provider the gateway is
/// built from `config.provider` using the secret source.
pub struct WingmanBuilder {
    config: WingmanConfig,
    provider: Option<Arc<dyn Provider>>,
    audio: Arc<dyn AudioOutput>,
    executor: Arc<dyn CommandExecutor>,
    events: Arc<dyn EventSink>,
    secrets: Arc<dyn SecretSource>,
    skills: Vec<Arc<dyn Skill>>,
}

impl fmt::Debug for WingmanBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WingmanBuilder")
            .field("config", &self.config.name)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("skills", &self.skills.len())
            .finish_non_exhaustive()
    }
}

impl WingmanBuilder {
    /// Start from a config.
    #[must_use]
    pub fn new(config: WingmanConfig) -> Self {
        Self {
            config,
            provider: None,
            audio: Arc::new(SilentOutput),
            executor: Arc::new(LoggingCommandExecutor),
            events: Arc::new(NoopEventSink),
            secrets: Arc::new(EnvSecrets),
            skills: Vec::new(),
        }
    }

    /// Use this provider instead of building one from the config.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Audio output for spoken text.
    #[must_use]
    pub fn audio(mut self, audio: Arc<dyn AudioOutput>) -> Self {
        self.audio = audio;
        self
    }

    /// Executor for command side effects.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Receiver of user-visible events.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Source of API keys.
    #[must_use]
    pub fn secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Attach a skill.
    #[must_use]
    pub fn skill(mut self, skill: Arc<dyn Skill>) -> Self {
        self.skills.push(skill);
        self
    }

    /// Build the wingman.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] when no provider was given and the
    /// configured one cannot be built, e.g. because its API key is missing.
    pub fn build(self) -> Result<Wingman> {
        let name = self.config.name.clone();
        let provider = match self.provider {
            Some(provider) => provider,
            None => provider::from_config(&name, &self.config.provider, self.secrets.as_ref())
                .map_err(|e| Error::Initialization(vec![e]))?,
        };

        let skills = Arc::new(SkillHost::new(&name, self.skills));
        let commands = Arc::new(CommandRegistry::new(self.config.commands.clone()));
        let tools = ToolRegistry::new(
            &name,
            commands,
            self.executor,
            Arc::clone(&skills),
            Arc::clone(&self.events),
        );
        let speaker = Speaker::new(
            &name,
            self.audio,
            Arc::clone(&skills),
            self.config.sound.clone(),
        );
        let history = ConversationHistory::new(self.config.features.remember_messages);
        let filler = FillerResponder::new(self.config.filler_responses.iter().cloned());

        Ok(Wingman {
            config: self.config,
            provider,
            tools,
            skills,
            speaker: Arc::new(speaker),
            events: self.events,
            secrets: self.secrets,
            history: Mutex::new(history),
            filler: Arc::new(StdMutex::new(filler)),
            call_token: AtomicU64::new(0),
        })
    }
}
