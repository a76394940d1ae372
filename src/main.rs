use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use triage::config::{DEFAULT_CONFIG_FILE, TriageToml};

mod cmd;

#[derive(Parser)]
#[command(name = "triage")]
#[command(version, about = "Turn-bounded symptom triage with cross-provider verification")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = "TRIAGE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Use canned in-process backends instead of real providers
        #[arg(long)]
        offline: bool,
    },
    /// Run one conversation turn from a JSON transcript file
    Turn {
        /// JSON array of {question, answer} exchanges
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        offline: bool,
    },
    /// Run the verification ensemble over a JSON request file
    Verify {
        /// JSON object with symptoms/transcript, analysis and optional patient_context
        #[arg(long)]
        input: PathBuf,
        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
        #[arg(long)]
        offline: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default triage.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&cli.config, command.clone());
    }

    let config = TriageToml::load_layered(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = triage::logging::init(
        config.logging.format,
        config.logging.directory.as_deref(),
        cli.verbose,
    )?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            offline,
        } => cmd::cmd_serve(config, host, port, offline).await,
        Commands::Turn {
            history,
            user_id,
            offline,
        } => cmd::cmd_turn(&config, &history, user_id, offline).await,
        Commands::Verify {
            input,
            json,
            offline,
        } => cmd::cmd_verify(&config, &input, json, offline).await,
        Commands::Config { .. } => Ok(()),
    }
}
