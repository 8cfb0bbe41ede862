//! stakeplan - interactive stake redistribution planner
//!
//! Loads a stake pool snapshot, lets the operator edit per-validator targets,
//! checks that the result can be funded and writes a plan file for execution
//! tooling.

use anyhow::Result;
use clap::Parser;

use stakectl::commands::Cli;
use stakectl::{error, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.log_json);

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
