//! `canon config`: show or change user defaults.

use anyhow::{Context, Result};
use clap::Subcommand;

use canon_core::{config as user_config, Config};

use super::Session;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Set one key (deployed_by, backup, templates_dir, history_limit).
    /// An empty value clears deployed_by or templates_dir.
    Set { key: String, value: String },
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let session = Session::load()?;
    match command {
        ConfigCommand::Show { json } => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&session.config)
                        .context("failed to serialize config JSON")?
                );
            } else {
                println!("# {}", user_config::config_path_at(&session.home).display());
                print_config(&session.config);
            }
        }
        ConfigCommand::Set { key, value } => {
            let mut config = session.config;
            config.set(&key, &value)?;
            user_config::save_at(&session.home, &config).context("failed to save config")?;
            println!("✓ {key} updated");
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    let unset = || "(unset)".to_string();
    println!(
        "deployed_by:   {}",
        config.deployed_by.clone().unwrap_or_else(unset)
    );
    println!("backup:        {}", config.backup);
    println!(
        "templates_dir: {}",
        config
            .templates_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(unset)
    );
    println!("history_limit: {}", config.history_limit);
}
