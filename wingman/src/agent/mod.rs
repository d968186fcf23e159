//! The wingman: one conversational persona and its completion cycle.
//!
//! A [`Wingman`] owns the conversation history of one persona and drives
//! every transcript through the same state machine:
//!
//! 1. Append the user message (skill hooks run first)
//! 2. Try instant activation; a matched command answers without the model
//! 3. Call the provider with `[context] + history` and the available tools
//! 4. Resolve tool calls, speaking interim text while they run
//! 5. Call the provider again when a skill asks for a summary, and loop
//!
//! Overlapping transcripts are tolerated. Every provider call takes a fresh
//! token and a completion that comes back after a newer call was dispatched
//! is dropped without touching the history.
//!
//! # Example
//!
//! ```rust,ignore
//! let wingman = Arc::new(
//!     WingmanBuilder::new(config)
//!         .audio(Arc::new(MyTts::default()))
//!         .build()?,
//! );
//! wingman.start().await?;
//! wingman.on_transcript("Lower the landing gear").await;
//! ```

mod builder;
mod instant;
mod runner;
mod tool_processor;

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use builder::WingmanBuilder;

use crate::audio::Speaker;
use crate::config::WingmanConfig;
use crate::error::{Error, InitializationError, Result};
use crate::events::{EventSink, WingmanEvent};
use crate::filler::{self, FillerResponder};
use crate::history::{ConversationHistory, ToolResponseUpdate};
use crate::message::Message;
use crate::provider::{Provider, SecretSource};
use crate::skill::SkillHost;
use crate::telemetry::BenchmarkResult;
use crate::tool::ToolRegistry;

/// Result of one completion cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Text the caller should speak, if any.
    pub final_text: Option<String>,
    /// Text that ended the turn without another model call. It was either
    /// already spoken by the tool that produced it or equals `final_text`.
    pub instant_text: Option<String>,
    /// Skill used during the turn.
    pub used_skill: Option<String>,
    /// Whether `final_text` may cut off audio that is still playing.
    pub interrupt: bool,
    /// Timing of the turn.
    pub benchmark: BenchmarkResult,
}

/// One configured persona.
pub struct Wingman {
    config: WingmanConfig,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    skills: Arc<SkillHost>,
    speaker: Arc<Speaker>,
    events: Arc<dyn EventSink>,
    secrets: Arc<dyn SecretSource>,
    history: Mutex<ConversationHistory>,
    filler: Arc<StdMutex<FillerResponder>>,
    call_token: AtomicU64,
}

impl fmt::Debug for Wingman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wingman")
            .field("name", &self.config.name)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl Wingman {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration this wingman was built from.
    #[must_use]
    pub const fn config(&self) -> &WingmanConfig {
        &self.config
    }

    /// Skills attached to this wingman.
    #[must_use]
    pub const fn skills(&self) -> &Arc<SkillHost> {
        &self.skills
    }

    /// Copy of the current conversation.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.messages().to_vec()
    }

    /// Tool call ids still waiting for a response.
    pub async fn pending_tool_calls(&self) -> Vec<String> {
        let history = self.history.lock().await;
        let mut ids: Vec<String> = history.pending().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Check configuration and skills. Any error keeps the wingman from
    /// starting.
    pub async fn validate(&self) -> Vec<InitializationError> {
        let mut errors = self.config.validate();
        errors.extend(self.skills.validate_all(self.secrets.as_ref()).await);
        errors
    }

    /// Prepare skills and, if enabled, start generating filler phrases in
    /// the background.
    pub async fn prepare(self: &Arc<Self>) -> Vec<InitializationError> {
        let errors = self.skills.prepare_all().await;
        if self.config.features.use_generic_instant_responses {
            info!(wingman = %self.name(), "generating filler phrases");
            let wingman = Arc::clone(self);
            tokio::spawn(async move { wingman.generate_filler_phrases().await });
        }
        errors
    }

    /// Validate, then prepare.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] with every validation or
    /// preparation error.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let errors = self.validate().await;
        if !errors.is_empty() {
            return Err(Error::Initialization(errors));
        }
        let errors = self.prepare().await;
        if !errors.is_empty() {
            return Err(Error::Initialization(errors));
        }
        info!(wingman = %self.name(), provider = self.provider.name(), "wingman ready");
        Ok(())
    }

    /// Unload all skills.
    pub async fn unload_skills(&self) {
        self.skills.unload_all().await;
    }

    /// Forget the whole conversation.
    pub async fn reset_conversation_history(&self) {
        self.history.lock().await.reset();
        debug!(wingman = %self.name(), "conversation history reset");
    }

    /// Store a late tool response, e.g. from a background skill task.
    ///
    /// Once every call of the owning assistant message is answered the
    /// block is moved to the end of the history.
    pub async fn update_tool_response(&self, tool_call_id: &str, content: impl Into<String>) -> bool {
        let update = self
            .history
            .lock()
            .await
            .update_tool_response(tool_call_id, content);
        if let ToolResponseUpdate::Promoted { len, .. } = update {
            self.events.emit(WingmanEvent::BlockPromoted {
                wingman: self.name().to_string(),
                tool_call_id: tool_call_id.to_string(),
                len,
            });
        }
        update.is_applied()
    }

    /// Handle a transcript end to end: run the cycle and speak the result.
    pub async fn on_transcript(&self, transcript: &str) -> CycleOutcome {
        self.events.emit(WingmanEvent::TranscriptReceived {
            wingman: self.name().to_string(),
            text: transcript.to_string(),
        });

        let outcome = self.respond(transcript).await;
        info!(wingman = %self.name(), benchmark = %outcome.benchmark, "turn finished");

        if let Some(text) = &outcome.final_text {
            self.events.emit(WingmanEvent::ResponseReady {
                wingman: self.name().to_string(),
                text: text.clone(),
                skill: outcome.used_skill.clone(),
            });
            self.speaker.play(text, outcome.interrupt).await;
        }
        outcome
    }

    fn pick_filler(&self) -> Option<String> {
        self.filler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pick()
    }

    async fn generate_filler_phrases(&self) {
        let context = self.context().await;
        match filler::generate_phrases(self.provider.as_ref(), &context).await {
            Ok(phrases) => {
                let added = self
                    .filler
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(phrases);
                info!(wingman = %self.name(), added, "filler phrases generated");
            }
            Err(e) => {
                warn!(wingman = %self.name(), error = %e, "could not generate filler phrases");
            }
        }
    }
}
