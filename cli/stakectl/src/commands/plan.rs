//! Plan command (interactive planning session).

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::export::{write_plan, PlanDocument};
use crate::names::apply_names;
use crate::output::{print_info, print_single, print_success, print_warning, OutputFormat};
use crate::provider::SnapshotOrigin;
use crate::session::{Session, SessionOutcome};

use super::CommandContext;

/// Plan command - edit targets and export a plan.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Read the snapshot from a file instead of the provider.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Read session commands from a file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Skip validator name lookup.
    #[arg(long)]
    no_names: bool,
}

impl PlanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let loaded = ctx.load_snapshot(self.file.as_deref()).await?;
        if loaded.origin == SnapshotOrigin::Cached {
            print_warning("Provider unreachable; planning against the last cached snapshot.");
        }

        let pool = loaded
            .snapshot
            .pool_address
            .clone()
            .or_else(|| ctx.config.pool.clone());
        let mut allocation = loaded
            .snapshot
            .to_allocation()
            .context("Snapshot cannot be planned against")?;

        if !self.no_names {
            if let Some(resolver) = ctx.name_resolver()? {
                apply_names(&mut allocation, &resolver).await;
            }
        }

        let policy = ctx.config.feasibility_policy();
        let stdout = io::stdout();
        let mut session = Session::new(allocation, policy, stdout.lock()).with_pool(pool);

        let outcome = match &self.script {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open script {:?}", path))?;
                session.run(BufReader::new(file))?
            }
            None => session.interactive(true).run(io::stdin().lock())?,
        };

        match outcome {
            SessionOutcome::Exported(plan) => {
                let document = PlanDocument::new(*plan)?;
                let path = write_plan(&document, &ctx.config.output_dir)?;
                match ctx.format {
                    OutputFormat::Json => print_single(&document),
                    OutputFormat::Table => {
                        print_success(&format!(
                            "Plan {} written to {}",
                            document.plan.plan_id,
                            path.display()
                        ));
                        print_info(&format!(
                            "{} operations, fingerprint {}",
                            document.operations.len(),
                            document.fingerprint
                        ));
                    }
                }
            }
            SessionOutcome::Quit | SessionOutcome::EndOfInput => {
                print_info("Session ended without exporting a plan.");
            }
        }

        Ok(())
    }
}
