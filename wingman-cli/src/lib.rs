//! Console front end for a wingman.
//!
//! Spoken text is printed instead of synthesised, events are logged, and
//! every line read from stdin is handled as one transcript.

pub mod console;

pub use console::{ConsoleAudio, LoggingEvents, Repl, default_config_path};
