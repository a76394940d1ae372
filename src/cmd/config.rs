//! Configuration view and validation commands: `triage config`.

use std::path::Path;

use anyhow::Result;
use triage::config::TriageToml;

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Triage Configuration");
            println!("====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config file at {}; using defaults.", config_path.display());
            }
            println!();

            let config = TriageToml::load_layered(config_path)?;
            print!("{}", config.to_toml()?);
            println!();

            println!("Credentials:");
            for backend in &config.backends {
                let status = if backend.resolve_api_key().is_some() {
                    "set"
                } else {
                    "missing"
                };
                println!(
                    "  {} ({}): {}",
                    backend.id,
                    backend.key_env().unwrap_or("none"),
                    status
                );
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = TriageToml::load_layered(config_path)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                println!(
                    "{} already exists. Use --force to overwrite.",
                    config_path.display()
                );
                return Ok(());
            }
            TriageToml::default().save(config_path)?;
            println!("Created {}", config_path.display());
        }
    }
    Ok(())
}
