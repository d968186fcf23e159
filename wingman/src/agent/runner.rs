//! The completion cycle.
//!
//! [`Wingman::respond`] turns one transcript into zero or more provider
//! calls:
//!
//! ```text
//! transcript ─▶ instant activation ──matched──▶ done
//!                    │
//!                    ▼
//!              provider call ◀──────────────┐
//!                    │                      │ summary needed
//!                    ▼                      │
//!              tool resolution ─────────────┘
//!                    │
//!                    ▼
//!                  done
//! ```
//!
//! Interim speech runs as a detached task next to tool resolution. It is
//! awaited before a tool speaks an instant response and before the turn
//! returns, so later speech always queues behind it.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::instant::InstantActivation;
use super::tool_processor::{ToolProcessor, settle_interim};
use super::{CycleOutcome, Wingman};
use crate::config::{BACKSTORY_PLACEHOLDER, SKILLS_PLACEHOLDER};
use crate::events::WingmanEvent;
use crate::message::Message;
use crate::provider::Completion;
use crate::skill::host::ResponseNeeds;
use crate::telemetry::{Benchmark, COMMANDS_AND_SKILLS, INSTANT_ACTIVATION, LLM_PROCESSING};
use crate::tool::repair_tool_calls;

/// How a turn ended, before timing is attached.
#[derive(Debug, Default)]
struct Turn {
    final_text: Option<String>,
    instant_text: Option<String>,
    used_skill: Option<String>,
    interrupt: bool,
}

impl Turn {
    fn silent(interrupt: bool, used_skill: Option<String>) -> Self {
        Self {
            interrupt,
            used_skill,
            ..Self::default()
        }
    }
}

impl Wingman {
    /// Run the completion cycle for one transcript.
    ///
    /// Nothing is spoken here except interim speech and instant responses
    /// of tools; the caller decides what to do with `final_text`.
    pub async fn respond(&self, transcript: &str) -> CycleOutcome {
        let mut benchmark = Benchmark::new(format!("Response for '{}'", self.name()));
        let mut interim = Vec::new();

        let turn = self.run_cycle(transcript, &mut benchmark, &mut interim).await;

        settle_interim(self.name(), &mut interim).await;

        CycleOutcome {
            final_text: turn.final_text,
            instant_text: turn.instant_text,
            used_skill: turn.used_skill,
            interrupt: turn.interrupt,
            benchmark: benchmark.finish(),
        }
    }

    async fn run_cycle(
        &self,
        transcript: &str,
        benchmark: &mut Benchmark,
        interim: &mut Vec<JoinHandle<()>>,
    ) -> Turn {
        self.add_user_message(transcript).await;

        benchmark.start_snapshot(INSTANT_ACTIVATION);
        let allow_tools = match self.try_instant_activation(transcript).await {
            InstantActivation::NotMatched => true,
            InstantActivation::Executed => false,
            InstantActivation::Responded(text) => {
                benchmark.finish_snapshot();
                return Turn {
                    final_text: text.clone(),
                    instant_text: text,
                    used_skill: None,
                    interrupt: true,
                };
            }
        };

        benchmark.start_snapshot(LLM_PROCESSING);
        let Some(mut completion) = self.llm_call(allow_tools).await else {
            return Turn::silent(true, None);
        };
        let mut needs = self.add_assistant_response(&mut completion).await;

        let max_rounds = self.config.features.max_tool_rounds.max(1);
        let mut rounds = 1;
        let mut interrupt = true;
        let mut used_skill = None;

        while !completion.tool_calls.is_empty() {
            let mut summarize = needs.summarize;
            if needs.waiting {
                let message = if completion.content.is_empty() {
                    let filler = self.pick_filler();
                    // A filler says nothing about the result.
                    summarize |= filler.is_some();
                    filler
                } else {
                    Some(completion.content.clone())
                };
                match message {
                    Some(text) => {
                        interim.push(self.speak_interim(text, interrupt));
                        interrupt = false;
                    }
                    None => summarize = true,
                }
            } else {
                summarize = true;
            }

            benchmark.start_snapshot(COMMANDS_AND_SKILLS);
            let batch = ToolProcessor::new(
                self.name(),
                &self.tools,
                &self.history,
                &self.speaker,
                self.events.as_ref(),
            )
            .process(&completion.tool_calls, interrupt, interim)
            .await;
            if batch.used_skill.is_some() {
                used_skill = batch.used_skill;
            }
            if let Some(text) = batch.instant_response {
                benchmark.finish_snapshot();
                return Turn {
                    final_text: None,
                    instant_text: Some(text),
                    used_skill,
                    interrupt,
                };
            }

            if !summarize {
                // Interim speech already answered the user.
                benchmark.finish_snapshot();
                return Turn::silent(interrupt, used_skill);
            }
            if rounds >= max_rounds {
                warn!(wingman = %self.name(), rounds, "tool round limit reached, ending turn");
                benchmark.finish_snapshot();
                return Turn::silent(interrupt, used_skill);
            }

            benchmark.start_snapshot(LLM_PROCESSING);
            let Some(next) = self.llm_call(true).await else {
                return Turn::silent(true, used_skill);
            };
            rounds += 1;
            completion = next;
            needs = self.add_assistant_response(&mut completion).await;
            if !completion.tool_calls.is_empty() {
                interrupt = false;
            }
        }

        benchmark.finish_snapshot();
        Turn {
            final_text: Some(completion.content.clone()).filter(|text| !text.is_empty()),
            instant_text: Some(completion.content).filter(|text| !text.is_empty()),
            used_skill,
            interrupt,
        }
    }

    /// Render the system context: the system prompt with backstory and
    /// skill prompts filled in. Built fresh for every provider call.
    pub async fn context(&self) -> String {
        let mut skills = String::new();
        for (name, prompt) in self.skills.prompts().await {
            let _ = write!(skills, "\n\n{name}\n\n{prompt}");
        }
        let backstory = self.config.prompts.backstory.as_deref().unwrap_or_default();
        self.config
            .prompts
            .system_prompt
            .replace(SKILLS_PLACEHOLDER, &skills)
            .replace(BACKSTORY_PLACEHOLDER, backstory)
    }

    pub(crate) async fn add_user_message(&self, text: &str) {
        self.skills.on_add_user_message(text).await;
        self.history.lock().await.append_user(text);
    }

    /// Repair the completion's tool calls, run skill hooks and append it with
    /// placeholders for every identified call.
    pub(crate) async fn add_assistant_response(&self, completion: &mut Completion) -> ResponseNeeds {
        for function_name in repair_tool_calls(&mut completion.tool_calls, self.tools.commands()) {
            self.events.emit(WingmanEvent::ToolCallRepaired {
                wingman: self.name().to_string(),
                function_name,
            });
        }

        self.skills
            .on_add_assistant_message(&completion.content, &completion.tool_calls)
            .await;
        self.history
            .lock()
            .await
            .append_assistant(completion.content.clone(), completion.tool_calls.clone());
        self.skills.assess(&completion.tool_calls).await
    }

    /// Call the provider with the current conversation.
    ///
    /// Returns `None` when the call failed or a newer call was dispatched
    /// while this one was in flight.
    async fn llm_call(&self, allow_tools: bool) -> Option<Completion> {
        let token = self.call_token.fetch_add(1, Ordering::SeqCst) + 1;

        let tools = if allow_tools && self.provider.supports_tools() {
            self.tools.definitions().await
        } else {
            Vec::new()
        };
        let mut messages = vec![Message::system(self.context().await)];
        messages.extend(self.history.lock().await.messages().iter().cloned());
        debug!(
            wingman = %self.name(),
            messages = messages.len() - 1,
            tools = tools.len(),
            "calling provider"
        );

        let result = self.provider.complete(&messages, &tools).await;

        if self.call_token.load(Ordering::SeqCst) != token {
            warn!(wingman = %self.name(), "provider call was superseded by a newer one");
            self.events.emit(WingmanEvent::StaleCompletionDiscarded {
                wingman: self.name().to_string(),
            });
            return None;
        }

        match result {
            Ok(completion) => {
                if let Some(usage) = &completion.usage {
                    debug!(
                        wingman = %self.name(),
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "provider usage"
                    );
                }
                Some(completion)
            }
            Err(e) => {
                warn!(wingman = %self.name(), provider = self.provider.name(), error = %e, "provider call failed");
                self.events.emit(WingmanEvent::Error {
                    wingman: self.name().to_string(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn speak_interim(&self, text: String, interrupt: bool) -> JoinHandle<()> {
        self.events.emit(WingmanEvent::InterimSpoken {
            wingman: self.name().to_string(),
            text: text.clone(),
        });
        let speaker = Arc::clone(&self.speaker);
        tokio::spawn(async move {
            speaker.play(&text, interrupt).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WingmanBuilder;
    use crate::config::{ProviderConfig, ProviderKind, WingmanConfig};
    use crate::error::ToolError;
    use crate::message::{Role, ToolArguments, ToolCall};
    use crate::provider::mock::MockProvider;
    use crate::skill::{Skill, SkillOutput};
    use crate::tool::{EXECUTE_COMMAND, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};

    struct Weather;

    #[async_trait]
    impl Skill for Weather {
        fn name(&self) -> &str {
            "Weather"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("get_weather", "Current weather", json!({"type": "object"}))]
        }

        async fn execute_tool(
            &self,
            _tool: &str,
            _args: &Map<String, Value>,
        ) -> Result<SkillOutput, ToolError> {
            Ok(SkillOutput::new("Sunny, 21 degrees"))
        }

        async fn prompt(&self) -> Option<String> {
            Some("You can look up the weather.".to_string())
        }
    }

    fn config() -> WingmanConfig {
        let mut config = WingmanConfig::new(
            "ATC",
            "You are a controller. {backstory}{skills}",
            ProviderConfig::new(ProviderKind::LocalLlm, "llama"),
        );
        config.prompts.backstory = Some("Calm and precise.".to_string());
        config
    }

    async fn wingman(provider: Arc<MockProvider>) -> Arc<Wingman> {
        let wingman = Arc::new(
            WingmanBuilder::new(config())
                .provider(provider)
                .skill(Arc::new(Weather))
                .build()
                .unwrap(),
        );
        wingman.start().await.unwrap();
        wingman
    }

    fn weather_call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_weather", ToolArguments::default())
    }

    #[tokio::test]
    async fn context_fills_backstory_and_skill_prompts() {
        let wingman = wingman(Arc::new(MockProvider::new())).await;
        assert_eq!(
            wingman.context().await,
            "You are a controller. Calm and precise.\n\nWeather\n\nYou can look up the weather."
        );
    }

    #[tokio::test]
    async fn plain_answer_ends_the_turn() {
        let provider = Arc::new(MockProvider::new().with_completion(Completion::text("Cleared to land.")));
        let wingman = wingman(provider.clone()).await;

        let outcome = wingman.respond("request landing").await;
        assert_eq!(outcome.final_text.as_deref(), Some("Cleared to land."));
        assert!(outcome.interrupt);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].role, Role::System);
        let tools: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, [EXECUTE_COMMAND, "get_weather"]);

        let history = wingman.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "request landing");
    }

    #[tokio::test]
    async fn skill_result_is_summarized() {
        let provider = Arc::new(
            MockProvider::new()
                .with_completion(Completion::with_tool_calls("", vec![weather_call("w1")]))
                .with_completion(Completion::text("It is sunny.")),
        );
        let wingman = wingman(provider.clone()).await;

        let outcome = wingman.respond("how is the weather").await;
        assert_eq!(outcome.final_text.as_deref(), Some("It is sunny."));
        assert_eq!(outcome.used_skill.as_deref(), Some("Weather"));
        assert_eq!(provider.call_count(), 2);

        let history = wingman.history().await;
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(history[2].content, "Sunny, 21 degrees");
        assert!(wingman.pending_tool_calls().await.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_silent() {
        let provider = Arc::new(MockProvider::new());
        let wingman = wingman(provider).await;

        let outcome = wingman.respond("anyone there").await;
        assert!(outcome.final_text.is_none());
        assert!(outcome.interrupt);
        assert_eq!(wingman.history().await.len(), 1);
    }

    #[tokio::test]
    async fn tool_rounds_are_bounded() {
        let provider = Arc::new(MockProvider::new());
        for i in 0..5 {
            provider.push(Ok(Completion::with_tool_calls("", vec![weather_call(&format!("w{i}"))])));
        }
        let mut config = config();
        config.features.max_tool_rounds = 3;
        let wingman = Arc::new(
            WingmanBuilder::new(config)
                .provider(provider.clone())
                .skill(Arc::new(Weather))
                .build()
                .unwrap(),
        );
        wingman.start().await.unwrap();

        let outcome = wingman.respond("weather, forever").await;
        assert!(outcome.final_text.is_none());
        assert_eq!(provider.call_count(), 3);
        assert!(wingman.pending_tool_calls().await.is_empty());
    }
}
