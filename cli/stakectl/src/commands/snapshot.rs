//! Snapshot command (fetch and show the pool snapshot).

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stakeplan_allocation::{Snapshot, SnapshotValidator};
use tabled::Tabled;

use crate::output::{
    format_amount, print_info, print_output, print_single, print_success, print_warning,
    OutputFormat,
};
use crate::provider::{write_snapshot, SnapshotOrigin};

use super::CommandContext;

/// Snapshot command - show what the provider reports for the pool.
#[derive(Debug, Args)]
pub struct SnapshotCommand {
    /// Read the snapshot from a file instead of the provider.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Also save the snapshot to this file.
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Debug, Serialize, Tabled)]
struct SnapshotRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Validator")]
    name: String,
    #[tabled(rename = "Vote account")]
    vote_account: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Transient")]
    transient: String,
}

impl SnapshotRow {
    fn new(index: usize, validator: &SnapshotValidator) -> Self {
        Self {
            index: index + 1,
            name: validator.name.clone().unwrap_or_else(|| "-".to_string()),
            vote_account: validator.vote_account.to_string(),
            active: format_amount(validator.active_balance),
            transient: format_amount(validator.transient_balance),
        }
    }
}

impl SnapshotCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let loaded = ctx.load_snapshot(self.file.as_deref()).await?;
        if loaded.origin == SnapshotOrigin::Cached {
            print_warning("Provider unreachable; showing the last cached snapshot.");
        }
        let snapshot = loaded.snapshot;
        snapshot.check()?;

        match ctx.format {
            OutputFormat::Json => print_single(&snapshot),
            OutputFormat::Table => print_snapshot(&snapshot),
        }

        if let Some(path) = &self.save {
            write_snapshot(path, &snapshot)?;
            print_success(&format!("Snapshot saved to {}", path.display()));
        }

        Ok(())
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    let rows: Vec<SnapshotRow> = snapshot
        .validators
        .iter()
        .enumerate()
        .map(|(i, v)| SnapshotRow::new(i, v))
        .collect();
    print_output(&rows, OutputFormat::Table);

    print_info(&format!(
        "Reserve {} holds {}; validators hold {} active, {} transient",
        snapshot.reserve_account_id,
        format_amount(snapshot.reserve_balance),
        format_amount(snapshot.total_active()),
        format_amount(snapshot.total_transient()),
    ));
    if let Some(fetched_at) = snapshot.fetched_at {
        print_info(&format!("Fetched at {}", fetched_at.to_rfc3339()));
    }
}
