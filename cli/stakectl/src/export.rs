//! Plan files.
//!
//! A plan file is the plan itself plus the operation list execution tooling
//! runs and a fingerprint over both. The fingerprint is a SHA-256 of the
//! canonical JSON (sorted keys), so `stakeplan check` can tell whether a file
//! was edited after export.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stakeplan_allocation::{to_lamports, Plan};
use stakeplan_id::{StakeAccount, VoteAccount};
use tabled::Tabled;

use crate::error::CliError;

/// Prefix of fingerprints produced by this version of the format.
const FINGERPRINT_PREFIX: &str = "sha256:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Withdraw all stake and delist the validator.
    Remove,
    /// List a new validator.
    Add,
    /// Move stake from the reserve to the validator.
    Increase,
    /// Move stake from the validator back to the reserve.
    Decrease,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Remove => "remove",
            OperationKind::Add => "add",
            OperationKind::Increase => "increase",
            OperationKind::Decrease => "decrease",
        }
    }
}

/// One step for execution tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OperationKind,
    pub vote_account: VoteAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_account_id: Option<StakeAccount>,
    pub amount: f64,
    pub lamports: u64,
}

impl Operation {
    fn new(
        kind: OperationKind,
        vote_account: &VoteAccount,
        stake_account_id: Option<&StakeAccount>,
        amount: f64,
    ) -> Self {
        Self {
            kind,
            vote_account: vote_account.clone(),
            stake_account_id: stake_account_id.cloned(),
            amount,
            lamports: to_lamports(amount),
        }
    }
}

/// Operations in execution order.
///
/// Stake is freed before it is spent: decreases and removals first, then
/// additions, then increases.
pub fn operations(plan: &Plan) -> Vec<Operation> {
    let mut ops = Vec::new();

    for m in plan.modifications.iter().filter(|m| m.change < 0.0) {
        ops.push(Operation::new(
            OperationKind::Decrease,
            &m.identity,
            m.stake_account_id.as_ref(),
            -m.change,
        ));
    }
    for r in &plan.removals {
        ops.push(Operation::new(
            OperationKind::Remove,
            &r.identity,
            r.stake_account_id.as_ref(),
            r.current_balance,
        ));
    }
    for a in &plan.additions {
        ops.push(Operation::new(OperationKind::Add, &a.identity, None, 0.0));
    }
    for a in plan.additions.iter().filter(|a| a.target_balance > 0.0) {
        ops.push(Operation::new(
            OperationKind::Increase,
            &a.identity,
            None,
            a.target_balance,
        ));
    }
    for m in plan.modifications.iter().filter(|m| m.change > 0.0) {
        ops.push(Operation::new(
            OperationKind::Increase,
            &m.identity,
            m.stake_account_id.as_ref(),
            m.change,
        ));
    }

    ops
}

/// The document written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument {
    #[serde(flatten)]
    pub plan: Plan,
    pub operations: Vec<Operation>,
    pub fingerprint: String,
}

impl PlanDocument {
    pub fn new(plan: Plan) -> Result<Self> {
        let operations = operations(&plan);
        let fingerprint = fingerprint(&plan, &operations)?;
        Ok(Self {
            plan,
            operations,
            fingerprint,
        })
    }

    /// Recompute the fingerprint and compare it with the recorded one.
    pub fn verify(&self) -> Result<(), CliError> {
        let computed = fingerprint(&self.plan, &self.operations)?;
        if computed != self.fingerprint {
            return Err(CliError::FingerprintMismatch {
                recorded: self.fingerprint.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// File name for this plan: `plan-<YYYYmmdd-HHMMSS>.json`.
    pub fn file_name(&self) -> String {
        format!(
            "plan-{}.json",
            self.plan.generated_at.format("%Y%m%d-%H%M%S")
        )
    }
}

fn fingerprint(plan: &Plan, operations: &[Operation]) -> Result<String> {
    // serde_json::Value keeps object keys sorted, so this is canonical.
    let value = serde_json::json!({
        "plan": serde_json::to_value(plan).context("failed to serialize plan")?,
        "operations": serde_json::to_value(operations).context("failed to serialize operations")?,
    });
    let bytes = serde_json::to_vec(&value).context("failed to serialize plan")?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{}{}", FINGERPRINT_PREFIX, hex::encode(hasher.finalize())))
}

/// Write the document into `dir`, returning the file path.
pub fn write_plan(document: &PlanDocument, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let path = dir.join(document.file_name());
    let contents = serde_json::to_string_pretty(document)?;
    fs::write(&path, contents).with_context(|| format!("Failed to write plan to {:?}", path))?;
    Ok(path)
}

/// Read a plan file without verifying it.
pub fn read_plan(path: &Path) -> Result<PlanDocument> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read plan from {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse plan from {:?}", path))
}

/// Table row for an operation.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct OperationRow {
    #[tabled(rename = "Step")]
    pub step: usize,
    #[tabled(rename = "Operation")]
    pub kind: &'static str,
    #[tabled(rename = "Vote account")]
    pub vote_account: String,
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[tabled(rename = "Lamports")]
    pub lamports: u64,
}

pub fn operation_rows(operations: &[Operation]) -> Vec<OperationRow> {
    operations
        .iter()
        .enumerate()
        .map(|(i, op)| OperationRow {
            step: i + 1,
            kind: op.kind.as_str(),
            vote_account: op.vote_account.to_string(),
            amount: crate::output::format_amount(op.amount),
            lamports: op.lamports,
        })
        .collect()
}
