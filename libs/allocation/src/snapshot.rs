//! Pool snapshot as delivered by a chain data provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stakeplan_id::{PoolAddress, ReserveAccount, StakeAccount, VoteAccount};

use crate::error::SnapshotError;
use crate::record::{Reserve, ValidatorRecord};
use crate::state::Allocation;

/// Point-in-time view of a pool's reserve and validator stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<PoolAddress>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,

    pub reserve_account_id: ReserveAccount,
    pub reserve_balance: f64,
    pub validators: Vec<SnapshotValidator>,
}

/// One validator entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotValidator {
    pub vote_account: VoteAccount,
    #[serde(default)]
    pub name: Option<String>,
    pub stake_account: StakeAccount,
    pub active_balance: f64,
    pub transient_stake_account: StakeAccount,
    pub transient_balance: f64,
}

impl Snapshot {
    /// Total active stake across all validators.
    pub fn total_active(&self) -> f64 {
        crate::round_to_precision(self.validators.iter().map(|v| v.active_balance).sum())
    }

    /// Total transient stake across all validators.
    pub fn total_transient(&self) -> f64 {
        crate::round_to_precision(self.validators.iter().map(|v| v.transient_balance).sum())
    }

    /// Checks balances and uniqueness without building anything.
    pub fn check(&self) -> Result<(), SnapshotError> {
        check_balance("reserve balance", self.reserve_account_id.as_str(), self.reserve_balance)?;

        let mut seen = std::collections::BTreeSet::new();
        for validator in &self.validators {
            let account = validator.vote_account.as_str();
            check_balance("active balance", account, validator.active_balance)?;
            check_balance("transient balance", account, validator.transient_balance)?;
            if !seen.insert(&validator.vote_account) {
                return Err(SnapshotError::DuplicateValidator(
                    validator.vote_account.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Builds a fresh allocation: every validator is kept at its active
    /// balance.
    pub fn to_allocation(&self) -> Result<Allocation, SnapshotError> {
        self.check()?;

        let reserve = Reserve::new(self.reserve_account_id.clone(), self.reserve_balance);
        let records = self.validators.iter().map(|v| {
            let mut record =
                ValidatorRecord::existing(v.vote_account.clone(), v.active_balance, v.transient_balance)
                    .with_stake_accounts(
                        v.stake_account.clone(),
                        Some(v.transient_stake_account.clone()),
                    );
            if let Some(name) = &v.name {
                record = record.with_display_name(name.clone());
            }
            record
        });

        Ok(Allocation::load(reserve, records)?)
    }
}

fn check_balance(field: &'static str, account: &str, value: f64) -> Result<(), SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(SnapshotError::InvalidBalance {
        field,
        account: account.to_string(),
        value,
    })
}
