//! Configuration view and validation commands (`review-arena config`).

use anyhow::Result;
use std::path::Path;

use review_arena::arena_config::{ArenaToml, CONFIG_FILE};

use super::super::ConfigCommands;
use super::{arena_dir, load_config};

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = arena_dir(project_dir).join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Arena Configuration");
            println!("===================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No arena.toml found at {}", config_path.display());
                println!("Using defaults. Run 'review-arena init' to create one.");
            }
            println!();

            let config = load_config(project_dir)?;
            println!("Effective values (with env overrides):");
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No arena.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = ArenaToml::load(&config_path)?;
            let warnings = toml.validate();

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
    }

    Ok(())
}
