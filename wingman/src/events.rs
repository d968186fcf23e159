//! User-visible notifications emitted during a conversation.
//!
//! The runtime never prints to a client directly. It pushes
//! [`WingmanEvent`]s into an [`EventSink`] injected at construction, and the
//! owner of the sink decides whether they end up in a UI, a socket or a log.

use serde::Serialize;
use tokio::sync::mpsc;

/// Something the client may want to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum WingmanEvent {
    /// A transcript reached the wingman.
    TranscriptReceived {
        /// Wingman name.
        wingman: String,
        /// Transcribed text.
        text: String,
    },
    /// Interim speech was started while tools run.
    InterimSpoken {
        /// Wingman name.
        wingman: String,
        /// Spoken text.
        text: String,
    },
    /// The final response of a turn is ready.
    ResponseReady {
        /// Wingman name.
        wingman: String,
        /// Response text.
        text: String,
        /// Skill that was used during the turn.
        skill: Option<String>,
    },
    /// A command was executed.
    CommandExecuted {
        /// Wingman name.
        wingman: String,
        /// Command name.
        command: String,
        /// Triggered by instant activation.
        instant: bool,
    },
    /// A skill tool started.
    SkillStarted {
        /// Wingman name.
        wingman: String,
        /// Skill name.
        skill: String,
        /// Tool name.
        tool: String,
    },
    /// A skill tool finished.
    SkillFinished {
        /// Wingman name.
        wingman: String,
        /// Skill name.
        skill: String,
        /// Tool name.
        tool: String,
        /// Wall time in milliseconds.
        elapsed_ms: u64,
        /// Whether the tool returned an error.
        failed: bool,
    },
    /// A command invoked as a function was rewritten to `execute_command`.
    ToolCallRepaired {
        /// Wingman name.
        wingman: String,
        /// Function name used by the model.
        function_name: String,
    },
    /// A completed tool-call block was moved to the end of the history.
    BlockPromoted {
        /// Wingman name.
        wingman: String,
        /// Tool call that completed the block.
        tool_call_id: String,
        /// Number of messages moved.
        len: usize,
    },
    /// A completion arrived after a newer call was dispatched and was dropped.
    StaleCompletionDiscarded {
        /// Wingman name.
        wingman: String,
    },
    /// Something failed during the turn.
    Error {
        /// Wingman name.
        wingman: String,
        /// Description.
        message: String,
    },
}

/// Receiver of [`WingmanEvent`]s.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, event: WingmanEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: WingmanEvent) {}
}

impl EventSink for mpsc::UnboundedSender<WingmanEvent> {
    fn emit(&self, event: WingmanEvent) {
        // A closed receiver means nobody listens any more.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = WingmanEvent::SkillFinished {
            wingman: "ATC".into(),
            skill: "Timer".into(),
            tool: "set_timer".into(),
            elapsed_ms: 12,
            failed: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "skill_finished");
        assert_eq!(json["elapsed_ms"], 12);
    }

    #[tokio::test]
    async fn channel_sink_forwards_and_tolerates_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(WingmanEvent::StaleCompletionDiscarded {
            wingman: "ATC".into(),
        });
        assert!(matches!(
            rx.recv().await,
            Some(WingmanEvent::StaleCompletionDiscarded { .. })
        ));

        drop(rx);
        tx.emit(WingmanEvent::Error {
            wingman: "ATC".into(),
            message: "gone".into(),
        });
    }
}
