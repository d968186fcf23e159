//! Resolution of the tool calls of one assistant message.
//!
//! Calls run one after another in the order the model issued them. A
//! failure is recorded as the tool response of that call and processing
//! continues with the next one.

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audio::Speaker;
use crate::events::{EventSink, WingmanEvent};
use crate::history::{ConversationHistory, ToolResponseUpdate};
use crate::message::ToolCall;
use crate::tool::{TOOL_ERROR_RESPONSE, ToolRegistry};

/// Outcome of processing one batch of tool calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToolBatch {
    /// Last non-empty instant response; ends the turn when set.
    pub instant_response: Option<String>,
    /// Last skill that handled a call successfully.
    pub used_skill: Option<String>,
}

/// Borrowed view of the wingman parts needed to resolve tool calls.
pub(crate) struct ToolProcessor<'a> {
    wingman: &'a str,
    tools: &'a ToolRegistry,
    history: &'a Mutex<ConversationHistory>,
    speaker: &'a Speaker,
    events: &'a dyn EventSink,
}

impl<'a> ToolProcessor<'a> {
    pub(crate) fn new(
        wingman: &'a str,
        tools: &'a ToolRegistry,
        history: &'a Mutex<ConversationHistory>,
        speaker: &'a Speaker,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            wingman,
            tools,
            history,
            speaker,
            events,
        }
    }

    /// Resolve `calls` and store their responses.
    ///
    /// Instant responses are spoken right away with the given `interrupt`
    /// flag, after the `interim` speech of the turn has reached the audio
    /// output.
    pub(crate) async fn process(
        &self,
        calls: &[ToolCall],
        interrupt: bool,
        interim: &mut Vec<JoinHandle<()>>,
    ) -> ToolBatch {
        let mut batch = ToolBatch::default();

        for call in calls {
            let args = match call.arguments.parse() {
                Ok(args) => args,
                Err(e) => {
                    warn!(
                        wingman = %self.wingman,
                        tool = %call.function_name,
                        error = %e,
                        "could not parse tool call arguments"
                    );
                    self.events.emit(WingmanEvent::Error {
                        wingman: self.wingman.to_string(),
                        message: format!("Error while processing tool call: {e}"),
                    });
                    self.record(call, TOOL_ERROR_RESPONSE).await;
                    continue;
                }
            };

            debug!(wingman = %self.wingman, tool = %call.function_name, "resolving tool call");
            let resolution = self.tools.resolve(&call.function_name, &args).await;
            if let Some(text) = &resolution.instant_response {
                settle_interim(self.wingman, interim).await;
                self.speaker.play(text, interrupt).await;
                batch.instant_response = Some(text.clone());
            }
            if resolution.skill.is_some() {
                batch.used_skill = resolution.skill;
            }
            self.record(call, resolution.response).await;
        }
        batch
    }

    async fn record(&self, call: &ToolCall, response: impl Into<String>) {
        if !call.has_id() {
            self.history.lock().await.add_tool_response(call, response);
            return;
        }

        let update = self
            .history
            .lock()
            .await
            .update_tool_response(&call.id, response);
        match update {
            ToolResponseUpdate::Promoted { len, .. } => {
                self.events.emit(WingmanEvent::BlockPromoted {
                    wingman: self.wingman.to_string(),
                    tool_call_id: call.id.clone(),
                    len,
                });
            }
            ToolResponseUpdate::Ignored => {
                // Placeholder gone, e.g. trimmed or reset meanwhile.
                warn!(wingman = %self.wingman, id = %call.id, "no placeholder for tool call");
            }
            ToolResponseUpdate::Updated | ToolResponseUpdate::Completed => {}
        }
    }
}

/// Wait until every interim speech task has handed its text to the audio
/// output.
pub(crate) async fn settle_interim(wingman: &str, interim: &mut Vec<JoinHandle<()>>) {
    for handle in interim.drain(..) {
        if let Err(e) = handle.await {
            warn!(wingman = %wingman, error = %e, "interim speech task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioOutput, Speaker};
    use crate::command::{Command, CommandRegistry, LoggingCommandExecutor};
    use crate::config::SoundConfig;
    use crate::events::NoopEventSink;
    use crate::history::TOOL_PLACEHOLDER;
    use crate::message::{Role, ToolArguments};
    use crate::skill::SkillHost;
    use crate::tool::EXECUTE_COMMAND;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<(String, bool)>>);

    #[async_trait]
    impl AudioOutput for Recorder {
        async fn play(&self, text: &str, interrupt: bool, _sound: &SoundConfig) -> crate::Result<()> {
            self.0.lock().unwrap().push((text.to_string(), interrupt));
            Ok(())
        }
    }

    struct Fixture {
        tools: ToolRegistry,
        history: Mutex<ConversationHistory>,
        speaker: Speaker,
        audio: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let skills = Arc::new(SkillHost::new("ATC", Vec::new()));
        let commands = CommandRegistry::new(vec![
            Command::new("Gear").with_response("Gear down"),
            Command::new("Lights"),
        ]);
        let tools = ToolRegistry::new(
            "ATC",
            Arc::new(commands),
            Arc::new(LoggingCommandExecutor),
            Arc::clone(&skills),
            Arc::new(NoopEventSink),
        );
        let audio = Arc::new(Recorder::default());
        let speaker = Speaker::new("ATC", audio.clone(), skills, SoundConfig::default());
        Fixture {
            tools,
            history: Mutex::new(ConversationHistory::new(None)),
            speaker,
            audio,
        }
    }

    fn command_call(id: &str, args: &str) -> ToolCall {
        ToolCall::new(id, EXECUTE_COMMAND, ToolArguments::Json(args.to_string()))
    }

    #[tokio::test]
    async fn responses_replace_placeholders_and_instant_text_is_spoken() {
        let f = fixture();
        let calls = vec![
            command_call("a", r#"{"command_name":"Lights"}"#),
            command_call("b", r#"{"command_name":"Gear"}"#),
        ];
        {
            let mut history = f.history.lock().await;
            history.append_user("gear and lights");
            history.append_assistant("", calls.clone());
        }

        let processor = ToolProcessor::new("ATC", &f.tools, &f.history, &f.speaker, &NoopEventSink);
        let batch = processor.process(&calls, true, &mut Vec::new()).await;

        assert_eq!(batch.instant_response.as_deref(), Some("Gear down"));
        assert_eq!(
            f.audio.0.lock().unwrap().as_slice(),
            [("Gear down".to_string(), true)]
        );
        let history = f.history.lock().await;
        let contents: Vec<&str> = history.messages()[2..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Ok", "Ok"]);
        assert!(history.pending().is_empty());
    }

    #[tokio::test]
    async fn broken_arguments_record_an_error_and_continue() {
        let f = fixture();
        let calls = vec![
            command_call("a", "{not json"),
            command_call("b", r#"{"command_name":"Lights"}"#),
        ];
        {
            let mut history = f.history.lock().await;
            history.append_user("lights");
            history.append_assistant("", calls.clone());
        }

        let processor = ToolProcessor::new("ATC", &f.tools, &f.history, &f.speaker, &NoopEventSink);
        let batch = processor.process(&calls, true, &mut Vec::new()).await;

        assert!(batch.instant_response.is_none());
        let history = f.history.lock().await;
        assert_eq!(history.messages()[2].content, TOOL_ERROR_RESPONSE);
        assert_eq!(history.messages()[3].content, "Ok");
        assert!(!history.messages().iter().any(|m| m.content == TOOL_PLACEHOLDER));
    }

    #[tokio::test]
    async fn calls_without_id_get_a_fresh_tool_message() {
        let f = fixture();
        let call = command_call("", r#"{"command_name":"Lights"}"#);
        {
            let mut history = f.history.lock().await;
            history.append_user("lights");
            history.append_assistant("", vec![call.clone()]);
        }

        let processor = ToolProcessor::new("ATC", &f.tools, &f.history, &f.speaker, &NoopEventSink);
        processor
            .process(std::slice::from_ref(&call), false, &mut Vec::new())
            .await;

        let history = f.history.lock().await;
        assert_eq!(history.len(), 3);
        let last = &history.messages()[2];
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, "Ok");
        assert_eq!(last.name.as_deref(), Some(EXECUTE_COMMAND));
    }
}
