//! TradeGate - cooldown-gated priority admission
//!
//! CLI entry point for the console transport and cooldown lookups.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use cooldownstore::CooldownStore;
use eyre::{Context, Result};
use tracing::{debug, info};

use tradegate::cli::{Cli, Command};
use tradegate::config::Config;
use tradegate::console::ConsoleSession;
use tradegate::priority::{CooldownStatus, PriorityResolver, RoleCooldownConfig};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tradegate")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("tradegate.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level from config file first, before full config load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        roles = config.priority.roles.len(),
        workers = config.queue.workers,
        "TradeGate loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Console) | None => cmd_console(&config).await,
        Some(Command::Status { identity, roles }) => cmd_status(&config, &identity, &roles).await,
    }
}

async fn cmd_console(config: &Config) -> Result<()> {
    debug!("cmd_console: called");
    let mut session = ConsoleSession::from_config(config);
    session.run().await
}

async fn cmd_status(config: &Config, identity: &str, roles: &[String]) -> Result<()> {
    debug!(%identity, ?roles, "cmd_status: called");

    let store = CooldownStore::load(&config.storage.cooldown_file);
    let resolver = PriorityResolver::with_system_clock(RoleCooldownConfig::from_settings(&config.priority), store);

    let status = resolver.check_status(identity, roles).await;
    match status {
        CooldownStatus::None => println!("{}", status.to_string().green()),
        CooldownStatus::Active {
            remaining_minutes, ..
        } if remaining_minutes > 0.0 => println!("{}", status.to_string().yellow()),
        CooldownStatus::Active { .. } => println!("{}", status),
    }
    Ok(())
}
