pub use crate::agent::{CycleOutcome, Wingman, WingmanBuilder};
pub use crate::audio::{AudioOutput, SilentOutput};
pub use crate::command::{Command, CommandExecutor, LoggingCommandExecutor};
pub use crate::config::{ProviderConfig, ProviderKind, SoundConfig, WingmanConfig};
pub use crate::error::{Error, InitializationError, ProviderError, Result, ToolError};
pub use crate::events::{EventSink, NoopEventSink, WingmanEvent};
pub use crate::message::{Message, Role, ToolArguments, ToolCall};
pub use crate::provider::{Completion, EnvSecrets, Provider, SecretSource, StaticSecrets};
pub use crate::skill::{Skill, SkillOutput};
pub use crate::tool::ToolDefinition;
