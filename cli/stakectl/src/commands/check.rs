//! Check command (verify a plan file).

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::error::CliError;
use crate::export::{operation_rows, read_plan};
use crate::output::{print_info, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Check command - verify a plan's fingerprint and feasibility record.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Path to the plan file.
    plan: PathBuf,
}

impl CheckCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let document = read_plan(&self.plan)?;
        document.verify()?;

        let feasibility = &document.plan.feasibility;
        if !feasibility.is_feasible() {
            return Err(CliError::InfeasiblePlan(Box::new(feasibility.clone())).into());
        }

        match ctx.format {
            OutputFormat::Json => print_single(&json!({
                "planId": document.plan.plan_id,
                "fingerprint": document.fingerprint,
                "summary": document.plan.summary,
                "operations": document.operations,
            })),
            OutputFormat::Table => {
                print_success(&format!(
                    "Plan {} is intact ({})",
                    document.plan.plan_id, document.fingerprint
                ));
                let summary = &document.plan.summary;
                print_info(&format!(
                    "{} validators after the plan: {} removed, {} added, {} modified",
                    summary.total_validators, summary.to_remove, summary.to_add, summary.to_modify
                ));
                print_output(&operation_rows(&document.operations), OutputFormat::Table);
            }
        }

        Ok(())
    }
}
