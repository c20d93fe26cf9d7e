//! Collegium CLI - operator tooling for the feedback-aggregation engine

use std::fs;

use clap::Parser;
use collegium_core::{Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "collegium")]
#[command(about = "Collegium - community-feedback aggregation and authority scoring")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate a configuration file against the governance guardrails
    Check {
        /// Configuration file path (JSON)
        #[arg(short, long, default_value = "config/collegium.json")]
        config: String,
    },
    /// Show engine status under the default configuration
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Some(Commands::Check { config }) => {
            let raw = fs::read_to_string(&config)?;
            let parsed: EngineConfig = serde_json::from_str(&raw)?;
            match parsed.validate() {
                Ok(()) => println!("Configuration OK: {}", config),
                Err(err) => {
                    println!("Configuration REJECTED: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Status) => {
            let engine = Engine::temporary(EngineConfig::default())?;
            println!("Collegium engine READY (config v{})", engine.config_version());
        }
        None => {
            println!("Collegium v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
