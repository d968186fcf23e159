//! Ordered conversation log with tool-response placeholders.
//!
//! [`ConversationHistory`] owns every [`Message`] of one wingman and the set
//! of tool call ids that still wait for a response. All mutation goes
//! through `&mut self`, so the agent serialises access behind one lock and
//! appends and updates never interleave.
//!
//! Tool calls can finish out of order relative to later turns. When the last
//! pending call of an assistant message resolves, its whole block (triggering
//! user messages, the assistant message, tool responses and any follow-up
//! assistant text) is moved to the end so the replayed conversation reads in
//! completion order.

use std::collections::HashSet;

use tracing::debug;

use crate::message::{Message, Role, ToolCall};

/// Content of a tool message whose call has not been answered yet.
pub const TOOL_PLACEHOLDER: &str = "Loading..";

/// Result of [`ConversationHistory::update_tool_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResponseUpdate {
    /// The id was empty or no tool message carries it.
    Ignored,
    /// The response was stored; sibling calls are still pending.
    Updated,
    /// All calls of the block are resolved and it already sits at the end.
    Completed,
    /// All calls of the block are resolved and the block was moved to the end.
    Promoted {
        /// Index the block started at before the move.
        from: usize,
        /// Number of messages moved.
        len: usize,
    },
}

impl ToolResponseUpdate {
    /// Whether a tool message was found and updated.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// The message log of one wingman plus its pending tool calls.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    pending: HashSet<String>,
    remember_messages: Option<usize>,
}

impl ConversationHistory {
    /// Create an empty history keeping the last `remember_messages` user
    /// turns, or everything when `None`.
    #[must_use]
    pub fn new(remember_messages: Option<usize>) -> Self {
        Self {
            messages: Vec::new(),
            pending: HashSet::new(),
            remember_messages,
        }
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ids of tool calls still waiting for a response.
    #[must_use]
    pub const fn pending(&self) -> &HashSet<String> {
        &self.pending
    }

    /// Whether the given call id is still pending.
    #[must_use]
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Trim to the retention policy, then append a user message.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.trim();
        self.messages.push(Message::user(text));
    }

    /// Append an assistant message and one placeholder per identified call.
    ///
    /// Calls without an id get no placeholder; their response is appended
    /// later with [`add_tool_response`](Self::add_tool_response).
    pub fn append_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        let placeholders: Vec<Message> = tool_calls
            .iter()
            .filter(|call| call.has_id())
            .map(|call| Message::tool(call, TOOL_PLACEHOLDER))
            .collect();

        self.messages
            .push(Message::assistant_with_tool_calls(content, tool_calls));
        for placeholder in placeholders {
            if let Some(id) = &placeholder.tool_call_id {
                self.pending.insert(id.clone());
            }
            self.messages.push(placeholder);
        }
    }

    /// Append a fresh tool message, used for calls that were issued no id.
    pub fn add_tool_response(&mut self, call: &ToolCall, content: impl Into<String>) {
        self.messages.push(Message::tool(call, content));
    }

    /// Store the response for `tool_call_id` and promote its block once
    /// every call of the owning assistant message is resolved.
    pub fn update_tool_response(
        &mut self,
        tool_call_id: &str,
        content: impl Into<String>,
    ) -> ToolResponseUpdate {
        if tool_call_id.is_empty() {
            return ToolResponseUpdate::Ignored;
        }

        let Some(tool_index) = self
            .messages
            .iter()
            .rposition(|m| m.answers_tool_call(tool_call_id))
        else {
            return ToolResponseUpdate::Ignored;
        };
        self.messages[tool_index].content = content.into();
        self.pending.remove(tool_call_id);

        let Some(assistant_index) = self.messages[..tool_index]
            .iter()
            .rposition(|m| m.issued_tool_call(tool_call_id))
        else {
            return ToolResponseUpdate::Updated;
        };

        let still_pending = self.messages[assistant_index]
            .tool_calls()
            .iter()
            .any(|call| self.pending.contains(&call.id));
        if still_pending {
            return ToolResponseUpdate::Updated;
        }

        let (start, end) = self.block_bounds(assistant_index);
        if end >= self.messages.len() {
            return ToolResponseUpdate::Completed;
        }

        let block: Vec<Message> = self.messages.drain(start..end).collect();
        let len = block.len();
        self.messages.extend(block);
        debug!(
            tool_call_id,
            from = start,
            len,
            "Moved completed message block to the end of the history"
        );
        ToolResponseUpdate::Promoted { from: start, len }
    }

    /// Block around an assistant message: the user messages directly before
    /// it through to (excluding) the next user message.
    fn block_bounds(&self, assistant_index: usize) -> (usize, usize) {
        let start = self.messages[..assistant_index]
            .iter()
            .rposition(|m| m.role != Role::User)
            .map_or(0, |i| i + 1);
        let end = self.messages[assistant_index + 1..]
            .iter()
            .position(|m| m.role == Role::User)
            .map_or(self.messages.len(), |i| assistant_index + 1 + i);
        (start, end)
    }

    /// Apply the retention policy.
    ///
    /// Keeps everything from the Nth-newest user message on. With fewer than
    /// N user messages, or no policy, nothing is removed. Pending ids of
    /// removed tool messages are dropped. Returns the number of messages
    /// deleted.
    pub fn trim(&mut self) -> usize {
        let Some(keep) = self.remember_messages.filter(|n| *n > 0) else {
            return 0;
        };

        let Some(cutoff) = self
            .messages
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, m)| m.role == Role::User)
            .nth(keep - 1)
            .map(|(i, _)| i)
        else {
            return 0;
        };
        if cutoff == 0 {
            return 0;
        }

        for message in &self.messages[..cutoff] {
            if let Some(id) = message.tool_call_id.as_deref()
                && message.role == Role::Tool
                && self.pending.remove(id)
            {
                debug!(
                    tool_call_id = id,
                    "Dropped pending tool call during history clean up"
                );
            }
        }
        self.messages.drain(..cutoff);
        debug!(
            deleted = cutoff,
            "Deleted messages from the conversation history"
        );
        cutoff
    }

    /// Remove every message and pending id.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending.clear();
    }
}
