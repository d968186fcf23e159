//! Interim "still working" phrases.
//!
//! While tool calls run, the wingman may speak a short filler phrase. The
//! [`FillerResponder`] keeps the pool and avoids repeating either of the two
//! most recent picks. The pool is seeded from the config and can be extended
//! with phrases generated by the provider at startup.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::message::Message;
use crate::provider::Provider;

/// Number of recent picks that are never repeated.
const RECENT_PICKS: usize = 2;

/// Attempts at getting a valid JSON list out of the provider.
const GENERATION_ATTEMPTS: usize = 3;

const GENERATION_PROMPT: &str = r#"Generate a list in JSON format of at least 20 short direct text responses.
Make sure the response only contains the JSON, no additional text.
They must fit the character described in the context given by the user.
Every generated response must be usable in any situation.
Responses must show that the request is still in progress and not finished.
The user request a response is used for is unknown, so it must be generic.
Good examples:
    - "Processing..."
    - "Stand by..."
Bad examples:
    - "Generating route..." (too specific)
    - "I'm sorry, I can't do that." (too negative)
Response example:
["OK", "Generating results...", "Roger that!", "Stand by..."]"#;

const CORRECTION_PROMPT: &str = "The whole response was parsed as JSON and failed. \
Answer with a pure, valid JSON list of strings and nothing else.";

/// Pool of filler phrases with non-repeating selection.
#[derive(Debug, Clone, Default)]
pub struct FillerResponder {
    phrases: Vec<String>,
    recent: VecDeque<usize>,
}

impl FillerResponder {
    /// Create a responder from an initial pool. Duplicates are dropped.
    #[must_use]
    pub fn new(phrases: impl IntoIterator<Item = String>) -> Self {
        let mut responder = Self::default();
        responder.extend(phrases);
        responder
    }

    /// Add phrases not yet in the pool. Returns how many were added.
    pub fn extend(&mut self, phrases: impl IntoIterator<Item = String>) -> usize {
        let before = self.phrases.len();
        for phrase in phrases {
            let phrase = phrase.trim();
            if !phrase.is_empty() && !self.phrases.iter().any(|p| p == phrase) {
                self.phrases.push(phrase.to_string());
            }
        }
        self.phrases.len() - before
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Number of phrases in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Pick a random phrase that is not one of the last two picks.
    ///
    /// Pools smaller than three exclude fewer recent picks so a phrase is
    /// always available.
    pub fn pick(&mut self) -> Option<String> {
        let len = self.phrases.len();
        if len == 0 {
            return None;
        }

        let excluded = RECENT_PICKS.min(len - 1);
        let blocked: Vec<usize> = self.recent.iter().rev().take(excluded).copied().collect();
        let candidates: Vec<usize> = (0..len).filter(|i| !blocked.contains(i)).collect();
        let index = candidates[fastrand::usize(..candidates.len())];

        self.recent.push_back(index);
        while self.recent.len() > RECENT_PICKS {
            self.recent.pop_front();
        }
        Some(self.phrases[index].clone())
    }
}

/// Ask the provider for generic filler phrases matching the persona.
///
/// `context` is the rendered system prompt of the wingman. Replies that are
/// not a JSON list are answered with a correction request, up to three
/// attempts in total.
///
/// # Errors
///
/// Returns the provider error of a failed call.
pub async fn generate_phrases(
    provider: &dyn Provider,
    context: &str,
) -> Result<Vec<String>, ProviderError> {
    let mut messages = vec![Message::system(GENERATION_PROMPT), Message::user(context)];

    for attempt in 1..=GENERATION_ATTEMPTS {
        let completion = provider.complete(&messages, &[]).await?;
        if completion.content.trim().is_empty() {
            debug!(attempt, "provider returned no filler phrases");
            return Ok(Vec::new());
        }

        match parse_phrases(&completion.content) {
            Some(phrases) => return Ok(phrases),
            None => {
                warn!(attempt, "filler phrases were not a JSON list, retrying");
                messages.push(Message::assistant(completion.content));
                messages.push(Message::user(CORRECTION_PROMPT));
            }
        }
    }
    Ok(Vec::new())
}

fn parse_phrases(raw: &str) -> Option<Vec<String>> {
    let Value::Array(items) = serde_json::from_str::<Value>(raw.trim()).ok()? else {
        return None;
    };
    Some(
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
    )
}
