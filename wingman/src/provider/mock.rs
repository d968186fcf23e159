//! Scripted provider for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Completion, Provider};
use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// One request seen by a [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Messages sent, system context first.
    pub messages: Vec<Message>,
    /// Tools offered.
    pub tools: Vec<ToolDefinition>,
}

/// Provider answering from a queue of scripted results.
///
/// Every request is recorded. Once the queue is empty each call fails with
/// a provider error.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    supports_tools: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            supports_tools: true,
        }
    }

    /// Queue a completion.
    #[must_use]
    pub fn with_completion(self, completion: Completion) -> Self {
        self.push(Ok(completion));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    /// Report no tool support.
    #[must_use]
    pub const fn without_tools(mut self) -> Self {
        self.supports_tools = false;
        self
    }

    /// Queue a result on a shared provider.
    pub fn push(&self, result: Result<Completion, ProviderError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// All requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests seen so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.to_vec(),
            });
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::provider("mock", "no scripted completion left")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_in_order_then_fails() {
        let provider = MockProvider::new()
            .with_completion(Completion::text("one"))
            .with_error(ProviderError::network("down"));

        let first = provider.complete(&[Message::user("a")], &[]).await.unwrap();
        assert_eq!(first.content, "one");
        assert!(provider.complete(&[], &[]).await.is_err());
        assert!(provider.complete(&[], &[]).await.is_err());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests()[0].messages[0].content, "a");
    }
}
