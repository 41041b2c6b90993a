//! CLI argument parsing for cooldownstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cds")]
#[command(author, version, about = "Inspect and clear priority cooldowns", long_about = None)]
pub struct Cli {
    /// Path to the cooldown file
    #[arg(short, long, default_value = crate::DEFAULT_COOLDOWN_FILE)]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every identity on cooldown
    List,

    /// Show the cooldown timestamp for one identity
    Get {
        /// Identity to look up
        #[arg(required = true)]
        identity: String,
    },

    /// Clear the cooldown for one identity
    Clear {
        /// Identity to clear
        #[arg(required = true)]
        identity: String,
    },

    /// Clear every cooldown
    ClearAll,
}
