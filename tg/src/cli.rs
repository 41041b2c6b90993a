//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TradeGate - cooldown-gated priority admission for trade workers
#[derive(Parser)]
#[command(
    name = "tg",
    about = "Cooldown-gated priority admission queue for trade-execution workers",
    version,
    after_help = "Logs are written to: ~/.local/share/tradegate/logs/tradegate.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive console driving the desk locally (default)
    Console,

    /// Show the priority cooldown of an identity
    Status {
        /// Identity to look up
        identity: String,

        /// Role held by the identity (repeatable)
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },
}
