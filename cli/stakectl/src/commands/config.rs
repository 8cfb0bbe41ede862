//! Config command (show or change saved configuration).

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::CONFIG_KEYS;
use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Show the effective configuration.
    Show,

    /// Save a value to the config file.
    Set {
        /// One of: pool, snapshot_url, names_url, output_dir, min_stake,
        /// request_timeout_secs.
        key: String,
        value: String,
    },
}

impl ConfigCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ConfigSubcommand::Show => {
                match ctx.format {
                    OutputFormat::Json => print_single(&ctx.config),
                    OutputFormat::Table => {
                        let config = &ctx.config;
                        println!(
                            "pool: {}",
                            config
                                .pool
                                .as_ref()
                                .map(|p| p.to_string())
                                .unwrap_or_else(|| "(not set)".to_string())
                        );
                        println!("snapshot_url: {}", config.snapshot_url);
                        println!(
                            "names_url: {}",
                            config.names_url.as_deref().unwrap_or("(not set)")
                        );
                        println!("output_dir: {}", config.output_dir.display());
                        println!("min_stake: {}", config.min_stake);
                        println!("request_timeout_secs: {}", config.request_timeout_secs);
                    }
                }
                Ok(())
            }
            ConfigSubcommand::Set { key, value } => {
                if !CONFIG_KEYS.contains(&key.as_str()) {
                    anyhow::bail!(
                        "Unknown config key '{}'. Valid keys: {}",
                        key,
                        CONFIG_KEYS.join(", ")
                    );
                }
                let mut config = ctx.file_config;
                config.set(&key, &value)?;
                let path = config.save()?;
                print_success(&format!("Set {} in {}", key, path.display()));
                Ok(())
            }
        }
    }
}
