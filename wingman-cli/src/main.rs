//! Wingman CLI - talk to a configured wingman from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use wingman::{Error, WingmanBuilder};
use wingman::command::LoggingCommandExecutor;
use wingman::config::WingmanConfig;
use wingman::provider::EnvSecrets;
use wingman_cli::{ConsoleAudio, LoggingEvents, Repl, default_config_path};

/// Run a wingman in the terminal. Each input line is one transcript.
#[derive(Parser, Debug)]
#[command(name = "wingman")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Wingman config file (JSON)
    #[arg(short, long, env = "WINGMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Send a single transcript and exit
    #[arg(short, long)]
    text: Option<String>,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "wingman={level},wingman_cli={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

fn report(error: &Error) {
    if let Error::Initialization(errors) = error {
        for error in errors {
            tracing::error!(%error, "wingman cannot start");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli.config.unwrap_or_else(default_config_path);
    let config = WingmanConfig::load(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    let name = config.name.clone();
    let wingman = WingmanBuilder::new(config)
        .audio(Arc::new(ConsoleAudio::new(name)))
        .executor(Arc::new(LoggingCommandExecutor))
        .events(Arc::new(LoggingEvents))
        .secrets(Arc::new(EnvSecrets))
        .build()
        .inspect_err(report)?;
    let wingman = Arc::new(wingman);
    wingman.start().await.inspect_err(report)?;

    let repl = Repl::new(Arc::clone(&wingman));
    match cli.text {
        Some(text) => {
            repl.handle_line(&text).await;
            wingman.unload_skills().await;
        }
        None => repl.run().await?,
    }
    Ok(())
}
