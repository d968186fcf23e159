//! Console collaborators and the interactive loop.

#![allow(clippy::print_stdout)] // the console is the audio device

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use wingman::Wingman;
use wingman::audio::AudioOutput;
use wingman::config::SoundConfig;
use wingman::events::{EventSink, WingmanEvent};

/// Default location of the wingman config file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wingman")
        .join("wingman.json")
}

/// Audio output that prints what would be spoken.
#[derive(Debug, Clone)]
pub struct ConsoleAudio {
    speaker: String,
}

impl ConsoleAudio {
    /// Print speech under the given name.
    #[must_use]
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
        }
    }

    fn render(&self, text: &str, interrupt: bool, sound: &SoundConfig) -> String {
        let mut line = format!("{}: {text}", self.speaker);
        if !interrupt {
            line.insert_str(0, "  ");
        }
        if !sound.effects.is_empty() {
            line.push_str(&format!(" [{}]", sound.effects.join(", ")));
        }
        line
    }
}

#[async_trait]
impl AudioOutput for ConsoleAudio {
    async fn play(&self, text: &str, interrupt: bool, sound: &SoundConfig) -> wingman::Result<()> {
        let mut stdout = io::stdout().lock();
        if sound.play_beep {
            write!(stdout, "\x07")?;
        }
        writeln!(stdout, "{}", self.render(text, interrupt, sound))?;
        stdout.flush()?;
        Ok(())
    }
}

/// Event sink writing every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEvents;

impl EventSink for LoggingEvents {
    fn emit(&self, event: WingmanEvent) {
        match &event {
            WingmanEvent::Error { wingman, message } => {
                warn!(wingman = %wingman, "{message}");
            }
            WingmanEvent::SkillFinished {
                wingman,
                skill,
                tool,
                elapsed_ms,
                failed,
            } => {
                info!(wingman = %wingman, skill = %skill, tool = %tool, elapsed_ms, failed, "skill finished");
            }
            other => info!(event = ?other, "wingman event"),
        }
    }
}

/// Line-based conversation loop.
#[derive(Debug)]
pub struct Repl {
    wingman: Arc<Wingman>,
}

impl Repl {
    /// Drive the given wingman.
    #[must_use]
    pub const fn new(wingman: Arc<Wingman>) -> Self {
        Self { wingman }
    }

    /// Handle one line. Returns `false` when the loop should stop.
    pub async fn handle_line(&self, line: &str) -> bool {
        match line.trim() {
            "" => true,
            "exit" | "quit" => false,
            "clear" => {
                self.wingman.reset_conversation_history().await;
                println!("History cleared.");
                true
            }
            transcript => {
                let outcome = self.wingman.on_transcript(transcript).await;
                if outcome.final_text.is_none() && outcome.instant_text.is_none() {
                    info!(wingman = %self.wingman.name(), "no response");
                }
                true
            }
        }
    }

    /// Read transcripts from stdin until `exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error when stdin cannot be read.
    pub async fn run(&self) -> io::Result<()> {
        println!(
            "{} is listening (type 'exit' to quit, 'clear' to reset history)",
            self.wingman.name()
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.handle_line(&line).await {
                break;
            }
        }
        self.wingman.unload_skills().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wingman::WingmanBuilder;
    use wingman::config::{ProviderConfig, ProviderKind, WingmanConfig};
    use wingman::provider::Completion;
    use wingman::provider::mock::MockProvider;

    #[test]
    fn queued_speech_is_indented() {
        let audio = ConsoleAudio::new("ATC");
        let sound = SoundConfig {
            effects: vec!["radio".to_string()],
            ..SoundConfig::default()
        };
        assert_eq!(audio.render("Roger.", true, &SoundConfig::default()), "ATC: Roger.");
        assert_eq!(audio.render("Roger.", false, &sound), "  ATC: Roger. [radio]");
    }

    #[tokio::test]
    async fn repl_commands() {
        let provider = Arc::new(MockProvider::new().with_completion(Completion::text("Copy.")));
        let config = WingmanConfig::new(
            "ATC",
            "You are a controller.",
            ProviderConfig::new(ProviderKind::LocalLlm, "llama"),
        );
        let wingman = Arc::new(WingmanBuilder::new(config).provider(provider).build().unwrap());
        let repl = Repl::new(Arc::clone(&wingman));

        assert!(repl.handle_line("   ").await);
        assert!(repl.handle_line("radio check").await);
        assert_eq!(wingman.history().await.len(), 2);
        assert!(repl.handle_line("clear").await);
        assert!(wingman.history().await.is_empty());
        assert!(!repl.handle_line("exit").await);
    }
}
