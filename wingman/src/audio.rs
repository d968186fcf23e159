//! Speech output.
//!
//! The runtime decides what is said and when. Rendering it is up to an
//! [`AudioOutput`] implementation (a TTS engine, a console, a test
//! recorder). The [`Speaker`] sits in front of it: it strips markdown,
//! lets skills rewrite the text and honours mute settings.

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SoundConfig;
use crate::error::Result;
use crate::skill::SkillHost;

/// Marker that suppresses playback of a text.
pub const SKIP_TTS_MARKER: &str = "{SKIP-TTS}";

/// Renders text as audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `text`. With `interrupt` set, anything currently playing is cut
    /// off; otherwise the text is queued behind it. Returns once the text is
    /// handed to the player, not when playback ends.
    async fn play(&self, text: &str, interrupt: bool, sound: &SoundConfig) -> Result<()>;
}

/// Output that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentOutput;

#[async_trait]
impl AudioOutput for SilentOutput {
    async fn play(&self, _text: &str, _interrupt: bool, _sound: &SoundConfig) -> Result<()> {
        Ok(())
    }
}

static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid code block regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid heading regex"));
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\*\*|__|~~)(.+?)(\*\*|__|~~)|\*([^*\n]+)\*").expect("valid emphasis regex")
});
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"));

/// Text prepared for speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanText {
    /// Speakable text.
    pub text: String,
    /// Links were removed.
    pub had_links: bool,
    /// Code blocks were removed.
    pub had_code_blocks: bool,
}

/// Strip markdown that makes no sense when read aloud.
///
/// Code blocks and bare URLs are dropped, links keep their label, emphasis
/// and heading markers are removed. Sentence punctuation is kept.
#[must_use]
pub fn cleanup_text(text: &str) -> CleanText {
    let had_code_blocks = CODE_BLOCK_RE.is_match(text);
    let text = CODE_BLOCK_RE.replace_all(text, "");
    let had_links = LINK_RE.is_match(&text) || URL_RE.is_match(&text);
    let text = LINK_RE.replace_all(&text, "$1");
    let text = URL_RE.replace_all(&text, "");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "$2$4");
    let text = SPACES_RE.replace_all(&text, " ");

    CleanText {
        text: text.trim().to_string(),
        had_links,
        had_code_blocks,
    }
}

/// Front end to the audio output of one wingman.
pub struct Speaker {
    wingman: String,
    output: Arc<dyn AudioOutput>,
    skills: Arc<SkillHost>,
    sound: SoundConfig,
}

impl fmt::Debug for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Speaker")
            .field("wingman", &self.wingman)
            .field("sound", &self.sound)
            .finish_non_exhaustive()
    }
}

impl Speaker {
    /// Create a speaker.
    #[must_use]
    pub fn new(
        wingman: impl Into<String>,
        output: Arc<dyn AudioOutput>,
        skills: Arc<SkillHost>,
        sound: SoundConfig,
    ) -> Self {
        Self {
            wingman: wingman.into(),
            output,
            skills,
            sound,
        }
    }

    /// Default sound settings.
    #[must_use]
    pub const fn sound(&self) -> &SoundConfig {
        &self.sound
    }

    /// Speak `text` with the default sound settings.
    ///
    /// Returns whether anything was handed to the audio output.
    pub async fn play(&self, text: &str, interrupt: bool) -> bool {
        self.play_with(text, interrupt, None).await
    }

    /// Speak `text`, optionally with custom sound settings.
    pub async fn play_with(
        &self,
        text: &str,
        interrupt: bool,
        sound: Option<&SoundConfig>,
    ) -> bool {
        let sound = sound.unwrap_or(&self.sound);
        let cleaned = cleanup_text(text);
        if cleaned.had_code_blocks || cleaned.had_links {
            debug!(wingman = %self.wingman, "removed code blocks or links before speech");
        }

        let text = self.skills.on_play_to_user(cleaned.text, sound).await;
        if text.is_empty() {
            return false;
        }
        if sound.is_muted() {
            debug!(wingman = %self.wingman, "volume is 0, skipping speech");
            return false;
        }
        if text.contains(SKIP_TTS_MARKER) {
            debug!(wingman = %self.wingman, "skip marker found, skipping speech");
            return false;
        }

        match self.output.play(&text, interrupt, sound).await {
            Ok(()) => true,
            Err(e) => {
                warn!(wingman = %self.wingman, error = %e, "audio output failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, bool)>>);

    #[async_trait]
    impl AudioOutput for Recorder {
        async fn play(&self, text: &str, interrupt: bool, _sound: &SoundConfig) -> Result<()> {
            self.0.lock().unwrap().push((text.to_string(), interrupt));
            Ok(())
        }
    }

    fn speaker(output: Arc<Recorder>, sound: SoundConfig) -> Speaker {
        Speaker::new("ATC", output, Arc::new(SkillHost::new("ATC", Vec::new())), sound)
    }

    #[test]
    fn cleanup_strips_markdown() {
        let cleaned = cleanup_text(
            "## Status\n**Fuel** is at *40%*. See [the manual](http://x.y/z).\n```rust\nfn main() {}\n```",
        );
        assert_eq!(cleaned.text, "Status\nFuel is at 40%. See the manual.");
        assert!(cleaned.had_links);
        assert!(cleaned.had_code_blocks);
    }

    #[test]
    fn cleanup_keeps_plain_sentences() {
        let cleaned = cleanup_text("Sure thing. Gear is down.");
        assert_eq!(cleaned.text, "Sure thing. Gear is down.");
        assert!(!cleaned.had_links);
    }

    #[tokio::test]
    async fn plays_with_interrupt_flag() {
        let output = Arc::new(Recorder::default());
        let speaker = speaker(output.clone(), SoundConfig::default());
        assert!(speaker.play("Copy that.", false).await);
        assert_eq!(
            output.0.lock().unwrap().as_slice(),
            [("Copy that.".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn muted_and_marked_text_is_skipped() {
        let output = Arc::new(Recorder::default());
        let muted = SoundConfig {
            volume: 0.0,
            ..SoundConfig::default()
        };
        assert!(!speaker(output.clone(), muted).play("Hello.", true).await);

        let speaker = speaker(output.clone(), SoundConfig::default());
        assert!(!speaker.play("{SKIP-TTS} Hello.", true).await);
        assert!(!speaker.play("   ", true).await);
        assert!(output.0.lock().unwrap().is_empty());
    }
}
