//! Lifecycle and hook fan-out for the skills of one wingman.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::Skill;
use crate::config::SoundConfig;
use crate::error::InitializationError;
use crate::message::ToolCall;
use crate::provider::SecretSource;
use crate::tool::{EXECUTE_COMMAND, ToolDefinition};

/// Whether a set of tool calls needs interim speech and a follow-up call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseNeeds {
    /// Speak something while the tools run.
    pub waiting: bool,
    /// Call the model again once the tools returned.
    pub summarize: bool,
}

#[derive(Default)]
struct HostState {
    attached: Vec<Arc<dyn Skill>>,
    prepared: Vec<Arc<dyn Skill>>,
    tool_owners: HashMap<String, Arc<dyn Skill>>,
    definitions: Vec<ToolDefinition>,
}

/// Owns the skills of one wingman.
///
/// Locks are only held to copy state out; no skill code ever runs while the
/// host is locked.
pub struct SkillHost {
    wingman: String,
    state: RwLock<HostState>,
}

impl fmt::Debug for SkillHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillHost")
            .field("wingman", &self.wingman)
            .finish_non_exhaustive()
    }
}

impl SkillHost {
    /// Create a host with the given skills attached but not yet prepared.
    #[must_use]
    pub fn new(wingman: impl Into<String>, skills: Vec<Arc<dyn Skill>>) -> Self {
        Self {
            wingman: wingman.into(),
            state: RwLock::new(HostState {
                attached: skills,
                ..HostState::default()
            }),
        }
    }

    /// Attach another skill. It takes part after the next [`prepare_all`](Self::prepare_all).
    pub async fn attach(&self, skill: Arc<dyn Skill>) {
        self.state.write().await.attached.push(skill);
    }

    async fn attached(&self) -> Vec<Arc<dyn Skill>> {
        self.state.read().await.attached.clone()
    }

    async fn prepared(&self) -> Vec<Arc<dyn Skill>> {
        self.state.read().await.prepared.clone()
    }

    /// Validate every attached skill concurrently.
    pub async fn validate_all(&self, secrets: &dyn SecretSource) -> Vec<InitializationError> {
        let skills = self.attached().await;
        let results = join_all(
            skills
                .iter()
                .map(|skill| skill.validate(&self.wingman, secrets)),
        )
        .await;
        results.into_iter().flatten().collect()
    }

    /// Prepare attached skills and register their tools.
    ///
    /// A skill whose `prepare` fails is skipped and reported. A tool name
    /// already owned by another skill, or clashing with `execute_command`,
    /// is ignored with a warning.
    pub async fn prepare_all(&self) -> Vec<InitializationError> {
        let mut errors = Vec::new();
        let mut ready = Vec::new();
        for skill in self.attached().await {
            match skill.prepare().await {
                Ok(()) => ready.push(skill),
                Err(e) => {
                    warn!(wingman = %self.wingman, skill = skill.name(), error = %e, "skill failed to prepare");
                    errors.push(InitializationError::unknown(
                        &self.wingman,
                        format!("Skill '{}' failed to prepare: {e}", skill.name()),
                    ));
                }
            }
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.prepared.clear();
        state.tool_owners.clear();
        state.definitions.clear();
        for skill in ready {
            for tool in skill.tools() {
                if tool.name == EXECUTE_COMMAND {
                    warn!(skill = skill.name(), "skill tool shadows the built-in command tool");
                    continue;
                }
                match state.tool_owners.entry(tool.name.clone()) {
                    Entry::Occupied(owner) => {
                        warn!(
                            tool = %tool.name,
                            skill = skill.name(),
                            owner = owner.get().name(),
                            "tool already registered by another skill"
                        );
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Arc::clone(&skill));
                        state.definitions.push(tool);
                    }
                }
            }
            info!(wingman = %self.wingman, skill = skill.name(), "skill prepared");
            state.prepared.push(skill);
        }
        errors
    }

    /// Unload every prepared skill and forget its tools.
    pub async fn unload_all(&self) {
        let skills = {
            let mut state = self.state.write().await;
            state.tool_owners.clear();
            state.definitions.clear();
            std::mem::take(&mut state.prepared)
        };
        for skill in skills {
            skill.unload().await;
            debug!(skill = skill.name(), "skill unloaded");
        }
    }

    /// Names of prepared skills.
    pub async fn skill_names(&self) -> Vec<String> {
        self.prepared()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Tool definitions of prepared skills.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        self.state.read().await.definitions.clone()
    }

    /// The skill handling `tool`, if any.
    pub async fn skill_for_tool(&self, tool: &str) -> Option<Arc<dyn Skill>> {
        self.state.read().await.tool_owners.get(tool).cloned()
    }

    /// Prompt sections as `(skill name, prompt)`, in preparation order.
    pub async fn prompts(&self) -> Vec<(String, String)> {
        let mut prompts = Vec::new();
        for skill in self.prepared().await {
            if let Some(prompt) = skill.prompt().await.filter(|p| !p.is_empty()) {
                prompts.push((skill.name().to_string(), prompt));
            }
        }
        prompts
    }

    /// Run every `on_add_user_message` hook. Failures are logged.
    pub async fn on_add_user_message(&self, text: &str) {
        for skill in self.prepared().await {
            if let Err(e) = skill.on_add_user_message(text).await {
                warn!(skill = skill.name(), error = %e, "on_add_user_message hook failed");
            }
        }
    }

    /// Run every `on_add_assistant_message` hook. Failures are logged.
    pub async fn on_add_assistant_message(&self, content: &str, tool_calls: &[ToolCall]) {
        for skill in self.prepared().await {
            if let Err(e) = skill.on_add_assistant_message(content, tool_calls).await {
                warn!(skill = skill.name(), error = %e, "on_add_assistant_message hook failed");
            }
        }
    }

    /// Pass `text` through every `on_play_to_user` hook in turn.
    ///
    /// A failing hook leaves the text as it was before that hook.
    pub async fn on_play_to_user(&self, text: String, sound: &SoundConfig) -> String {
        let mut text = text;
        for skill in self.prepared().await {
            match skill.on_play_to_user(text.clone(), sound).await {
                Ok(rewritten) => text = rewritten,
                Err(e) => warn!(skill = skill.name(), error = %e, "on_play_to_user hook failed"),
            }
        }
        text
    }

    /// Decide interim speech and follow-up needs for freshly issued calls.
    ///
    /// Only calls carrying an id count. A skill-owned tool contributes its
    /// skill's answers. If `execute_command` is the only tool used, interim
    /// speech is always needed.
    pub async fn assess(&self, tool_calls: &[ToolCall]) -> ResponseNeeds {
        let mut needs = ResponseNeeds::default();
        let mut unique: Vec<&str> = Vec::new();

        for call in tool_calls.iter().filter(|c| c.has_id()) {
            if let Some(skill) = self.skill_for_tool(&call.function_name).await {
                needs.waiting |= skill.is_waiting_response_needed(&call.function_name).await;
                needs.summarize |= skill.is_summarize_needed(&call.function_name).await;
            }
            if !unique.contains(&call.function_name.as_str()) {
                unique.push(&call.function_name);
            }
        }

        if unique == [EXECUTE_COMMAND] {
            needs.waiting = true;
        }
        needs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ToolError};
    use crate::message::ToolArguments;
    use crate::provider::StaticSecrets;
    use crate::skill::SkillOutput;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Timer {
        summarize: bool,
        unloaded: AtomicUsize,
    }

    #[async_trait]
    impl Skill for Timer {
        fn name(&self) -> &str {
            "Timer"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("set_timer", "Set a timer", json!({"type": "object"}))]
        }

        async fn execute_tool(
            &self,
            _tool: &str,
            _args: &Map<String, Value>,
        ) -> Result<SkillOutput, ToolError> {
            Ok(SkillOutput::new("set"))
        }

        async fn prompt(&self) -> Option<String> {
            Some("You can set timers.".into())
        }

        async fn is_waiting_response_needed(&self, _tool: &str) -> bool {
            false
        }

        async fn is_summarize_needed(&self, _tool: &str) -> bool {
            self.summarize
        }

        async fn on_play_to_user(&self, text: String, _sound: &SoundConfig) -> crate::Result<String> {
            Ok(text.replace("timer", "countdown"))
        }

        async fn unload(&self) {
            self.unloaded.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Broken;

    #[async_trait]
    impl Skill for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("set_timer", "Clash", json!({}))]
        }

        async fn execute_tool(
            &self,
            tool: &str,
            _args: &Map<String, Value>,
        ) -> Result<SkillOutput, ToolError> {
            Err(ToolError::execution(tool, "always fails"))
        }

        async fn validate(
            &self,
            wingman: &str,
            secrets: &dyn SecretSource,
        ) -> Vec<InitializationError> {
            if secrets.secret("broken").is_some() {
                Vec::new()
            } else {
                vec![InitializationError::missing_secret(wingman, "broken")]
            }
        }

        async fn on_add_user_message(&self, _text: &str) -> crate::Result<()> {
            Err(Error::config("hook exploded"))
        }

        async fn on_play_to_user(&self, _text: String, _sound: &SoundConfig) -> crate::Result<String> {
            Err(Error::config("no audio"))
        }
    }

    fn timer(summarize: bool) -> Arc<Timer> {
        Arc::new(Timer {
            summarize,
            unloaded: AtomicUsize::new(0),
        })
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, ToolArguments::default())
    }

    #[tokio::test]
    async fn validation_collects_errors() {
        let skills: Vec<Arc<dyn Skill>> = vec![timer(true), Arc::new(Broken)];
        let host = SkillHost::new("ATC", skills);
        let errors = host.validate_all(&StaticSecrets::new()).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].secret_name.as_deref(), Some("broken"));

        let secrets = StaticSecrets::new().with("broken", "x");
        assert!(host.validate_all(&secrets).await.is_empty());
    }

    #[tokio::test]
    async fn first_skill_keeps_a_clashing_tool() {
        let skills: Vec<Arc<dyn Skill>> = vec![timer(true), Arc::new(Broken)];
        let host = SkillHost::new("ATC", skills);
        assert!(host.prepare_all().await.is_empty());

        assert_eq!(host.definitions().await.len(), 1);
        let owner = host.skill_for_tool("set_timer").await.unwrap();
        assert_eq!(owner.name(), "Timer");
        assert_eq!(host.skill_names().await, ["Timer", "Broken"]);
    }

    #[tokio::test]
    async fn prompts_and_play_hooks_chain() {
        let skills: Vec<Arc<dyn Skill>> = vec![timer(true), Arc::new(Broken)];
        let host = SkillHost::new("ATC", skills);
        host.prepare_all().await;

        let prompts = host.prompts().await;
        assert_eq!(prompts, [("Timer".to_string(), "You can set timers.".to_string())]);

        let text = host
            .on_play_to_user("timer set".into(), &SoundConfig::default())
            .await;
        assert_eq!(text, "countdown set");

        host.on_add_user_message("hello").await;
    }

    #[tokio::test]
    async fn assess_combines_skill_answers() {
        let skills: Vec<Arc<dyn Skill>> = vec![timer(false)];
        let host = SkillHost::new("ATC", skills);
        host.prepare_all().await;

        let needs = host.assess(&[call("a", "set_timer")]).await;
        assert_eq!(needs, ResponseNeeds { waiting: false, summarize: false });

        let needs = host.assess(&[call("a", EXECUTE_COMMAND), call("b", EXECUTE_COMMAND)]).await;
        assert!(needs.waiting);
        assert!(!needs.summarize);

        let needs = host.assess(&[call("a", EXECUTE_COMMAND), call("b", "set_timer")]).await;
        assert!(!needs.waiting);

        let needs = host.assess(&[call("", EXECUTE_COMMAND)]).await;
        assert_eq!(needs, ResponseNeeds::default());
    }

    #[tokio::test]
    async fn unload_clears_tools() {
        let skill = timer(true);
        let skills: Vec<Arc<dyn Skill>> = vec![skill.clone()];
        let host = SkillHost::new("ATC", skills);
        host.prepare_all().await;
        host.unload_all().await;

        assert!(host.definitions().await.is_empty());
        assert!(host.skill_for_tool("set_timer").await.is_none());
        assert_eq!(skill.unloaded.load(Ordering::SeqCst), 1);
    }
}
