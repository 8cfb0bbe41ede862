//! CLI commands.

mod check;
mod config;
mod plan;
mod snapshot;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use stakeplan_id::PoolAddress;

use crate::config::{cache_dir, parse_min_stake, Config, Overrides};
use crate::names::HttpNameResolver;
use crate::output::OutputFormat;
use crate::provider::{
    load_snapshot, FileSnapshotProvider, HttpSnapshotProvider, LoadedSnapshot, SnapshotCache,
    SnapshotProvider,
};

/// stakeplan - plan stake redistribution across a pool's validators.
#[derive(Debug, Parser)]
#[command(name = "stakeplan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Stake pool address.
    #[arg(long, global = true, env = "STAKEPLAN_POOL")]
    pool: Option<PoolAddress>,

    /// Snapshot provider base URL.
    #[arg(long, global = true, env = "STAKEPLAN_SNAPSHOT_URL")]
    snapshot_url: Option<String>,

    /// Validator name service URL.
    #[arg(long, global = true, env = "STAKEPLAN_NAMES_URL")]
    names_url: Option<String>,

    /// Directory plan files are written to.
    #[arg(long, global = true, env = "STAKEPLAN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Minimum stake each active validator must keep.
    #[arg(long, global = true, value_parser = parse_min_stake)]
    min_stake: Option<f64>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch and show the pool snapshot.
    Snapshot(snapshot::SnapshotCommand),

    /// Start an interactive planning session.
    Plan(plan::PlanCommand),

    /// Verify a plan file and show its operations.
    Check(check::CheckCommand),

    /// Show or change saved configuration.
    Config(config::ConfigCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = OutputFormat::parse(&self.format);

        let file_config = Config::load()?;
        let config = file_config.clone().with_overrides(Overrides {
            pool: self.pool,
            snapshot_url: self.snapshot_url,
            names_url: self.names_url,
            output_dir: self.output_dir,
            min_stake: self.min_stake,
        });

        let ctx = CommandContext {
            config,
            file_config,
            format,
        };

        match self.command {
            Commands::Snapshot(cmd) => cmd.run(ctx).await,
            Commands::Plan(cmd) => cmd.run(ctx).await,
            Commands::Check(cmd) => cmd.run(ctx).await,
            Commands::Config(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("stakeplan {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    /// Effective configuration (file, environment and flags).
    pub config: Config,
    /// Configuration as stored on disk, for `config set`.
    pub file_config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load the session snapshot from a file or the configured provider.
    ///
    /// Only provider snapshots go through the cache.
    pub async fn load_snapshot(&self, file: Option<&Path>) -> Result<LoadedSnapshot> {
        if let Some(path) = file {
            let provider = FileSnapshotProvider::new(path);
            return Ok(load_snapshot(&provider, None).await?);
        }

        let pool = self.config.require_pool()?.clone();
        let provider = HttpSnapshotProvider::new(
            &self.config.snapshot_url,
            pool.clone(),
            self.config.request_timeout(),
        )?;
        let cache = match cache_dir() {
            Ok(dir) => Some(SnapshotCache::new(dir)),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot cache disabled");
                None
            }
        };

        let provider: &dyn SnapshotProvider = &provider;
        Ok(load_snapshot(provider, cache.as_ref().map(|c| (c, &pool))).await?)
    }

    /// Name resolver, if a names URL is configured.
    pub fn name_resolver(&self) -> Result<Option<HttpNameResolver>> {
        self.config
            .names_url
            .as_deref()
            .map(|url| HttpNameResolver::new(url, self.config.request_timeout()))
            .transpose()
    }
}
