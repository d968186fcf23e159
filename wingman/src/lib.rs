//! Wingman is the conversation core of a voice assistant runtime.
//!
//! A [`Wingman`](agent::Wingman) receives transcribed speech, keeps an
//! order-sensitive conversation history, asks a configurable LLM
//! [`Provider`](provider::Provider) for a completion, resolves the returned
//! tool calls against local commands and pluggable [`Skill`](skill::Skill)s
//! and hands the text that should be spoken to an
//! [`AudioOutput`](audio::AudioOutput).
//!
//! Audio devices, speech-to-text, text-to-speech and vendor SDKs are
//! collaborators behind traits; this crate only decides *what* is said and
//! *when*.

pub mod agent;
pub mod audio;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod filler;
pub mod history;
pub mod message;
pub mod prelude;
pub mod provider;
pub mod skill;
pub mod telemetry;
pub mod tool;

pub use agent::{CycleOutcome, Wingman, WingmanBuilder};
pub use error::{Error, Result};
