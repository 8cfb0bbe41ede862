//! Error handling and display for the CLI.

use colored::Colorize;
use stakeplan_allocation::FeasibilityReport;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No stake pool configured. Pass --pool or run `stakeplan config set pool <ADDRESS>`.")]
    NoPool,

    #[error("Snapshot unavailable from {origin}: {message}")]
    SnapshotUnavailable { origin: String, message: String },

    #[error("Provider returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Plan is not feasible:\n{0}")]
    InfeasiblePlan(Box<FeasibilityReport>),

    #[error("Plan fingerprint mismatch: file says {recorded}, contents hash to {computed}")]
    FingerprintMismatch { recorded: String, computed: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a snapshot-unavailable error.
    pub fn snapshot_unavailable(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::SnapshotUnavailable {
            origin: origin.into(),
            message: message.to_string(),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::SnapshotUnavailable { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: No cached snapshot exists for this pool yet. Check --snapshot-url or pass --file.".yellow()
                );
            }
            CliError::Http { status, .. } if *status == 404 => {
                eprintln!(
                    "\n{}",
                    "Hint: The provider does not know this pool. Check the pool address.".yellow()
                );
            }
            CliError::Network(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check your network connection and snapshot endpoint.".yellow()
                );
            }
            CliError::InfeasiblePlan(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Free stake with `r`, `-` or `s` before exporting.".yellow()
                );
            }
            CliError::FingerprintMismatch { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: The plan file was edited after export. Regenerate it.".yellow()
                );
            }
            _ => {}
        }
    }
}
