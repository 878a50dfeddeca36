//! cadence-bot: accountability check-in bot for a chat group.
//!
//! Listens for chat events on a webhook, runs the round lifecycle
//! (signup → active → closed), records daily check-ins and replies with
//! generated feedback.

use clap::Parser;
use std::path::PathBuf;

use cadence_bot::config::Config;
use cadence_bot::server;
use cadence_bot::state::AppState;

/// Accountability check-in bot.
#[derive(Parser)]
#[command(name = "cadence-bot", version, about)]
struct Cli {
    /// Path to the YAML config file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the config.
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path, overriding the config.
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    if let Some(db) = cli.db {
        config.database_path = db.display().to_string();
    }

    let state = AppState::new(&config)?;
    server::serve(state, config.listen_port).await
}

/// `RUST_LOG` verbatim when set (including quieter-than-info settings),
/// otherwise an `info` default.
fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}
