use chrono::Utc;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use cooldownstore::CooldownStore;
use cooldownstore::cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("cooldownstore starting on {}", cli.file.display());

    let mut store = CooldownStore::load(&cli.file);

    match cli.command {
        Command::List => {
            if store.is_empty() {
                println!("No cooldowns found");
            } else {
                let now = Utc::now();
                for record in store.records() {
                    let minutes = (now - record.last_elevated_at).num_seconds() as f64 / 60.0;
                    println!(
                        "{} {} {}",
                        record.identity.cyan(),
                        record.last_elevated_at.to_rfc3339(),
                        format!("({:.2} min ago)", minutes).dimmed()
                    );
                }
            }
        }
        Command::Get { identity } => match store.get(&identity) {
            Some(at) => println!("{} {}", identity.cyan(), at.to_rfc3339()),
            None => println!("{} has no cooldown", identity),
        },
        Command::Clear { identity } => {
            if store.remove(&identity) {
                println!("{} Cleared cooldown: {}", "✓".green(), identity);
            } else {
                println!("{} has no cooldown", identity);
            }
        }
        Command::ClearAll => {
            let removed = store.clear_all();
            println!("{} Cleared {} cooldown(s)", "✓".green(), removed);
        }
    }

    Ok(())
}
