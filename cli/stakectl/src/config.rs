//! Configuration management.
//!
//! Handles:
//! - Snapshot and name-service endpoints
//! - The pool to plan for
//! - Where plans are written and the snapshot cache lives
//!
//! Values come from the config file, then environment variables and flags
//! (through clap), in increasing priority.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use stakeplan_allocation::FeasibilityPolicy;
use stakeplan_id::PoolAddress;

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Keys accepted by `stakeplan config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "pool",
    "snapshot_url",
    "names_url",
    "output_dir",
    "min_stake",
    "request_timeout_secs",
];

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "stakeplan", "stakeplan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the config directory path.
pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Get the snapshot cache directory path.
pub fn cache_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join("snapshots"))
}

/// Parse a minimum stake: a finite, non-negative number of coins.
///
/// Shared by `--min-stake` and `config set min_stake`.
pub fn parse_min_stake(value: &str) -> Result<f64, String> {
    let min_stake: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid min_stake '{}'", value))?;
    if !min_stake.is_finite() || min_stake < 0.0 {
        return Err(format!(
            "min_stake must be a non-negative number, got '{}'",
            value
        ));
    }
    Ok(min_stake)
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Stake pool to plan for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolAddress>,

    /// Base URL of the snapshot provider.
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,

    /// Validator metadata endpoint. Name lookup is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names_url: Option<String>,

    /// Directory plan files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Minimum stake every active validator must keep.
    #[serde(default = "default_min_stake")]
    pub min_stake: f64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_snapshot_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_min_stake() -> f64 {
    FeasibilityPolicy::default().min_stake_per_validator
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: None,
            snapshot_url: default_snapshot_url(),
            names_url: None,
            output_dir: default_output_dir(),
            min_stake: default_min_stake(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pool: Option<PoolAddress>,
    pub snapshot_url: Option<String>,
    pub names_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub min_stake: Option<f64>,
}

impl Config {
    /// Load config from disk, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    /// Load config from a specific file, or return default if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_dir()?.join(CONFIG_FILE);
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
        }

        Ok(())
    }

    /// Apply flag and environment values on top of the file.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(pool) = overrides.pool {
            self.pool = Some(pool);
        }
        if let Some(url) = overrides.snapshot_url {
            self.snapshot_url = url;
        }
        if let Some(url) = overrides.names_url {
            self.names_url = Some(url);
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(min_stake) = overrides.min_stake {
            self.min_stake = min_stake;
        }
        self
    }

    /// Set a single key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pool" => self.pool = Some(value.parse().context("Invalid pool address")?),
            "snapshot_url" => self.snapshot_url = value.trim_end_matches('/').to_string(),
            "names_url" => {
                self.names_url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "output_dir" => self.output_dir = PathBuf::from(value),
            "min_stake" => {
                self.min_stake = parse_min_stake(value).map_err(anyhow::Error::msg)?
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid request_timeout_secs '{}'", value))?
            }
            other => anyhow::bail!(
                "Unknown config key '{}'. Valid keys: {}",
                other,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Require a pool, failing with a hint when none is configured.
    pub fn require_pool(&self) -> Result<&PoolAddress, crate::error::CliError> {
        self.pool.as_ref().ok_or(crate::error::CliError::NoPool)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The feasibility rules plans are checked against.
    pub fn feasibility_policy(&self) -> FeasibilityPolicy {
        FeasibilityPolicy::with_min_stake(self.min_stake)
    }
}
