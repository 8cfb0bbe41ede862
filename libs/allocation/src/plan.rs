//! The finalized plan handed to execution tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stakeplan_id::{PlanId, PoolAddress, ReserveAccount, StakeAccount, VoteAccount};

use crate::error::PlanError;
use crate::feasibility::{validate, FeasibilityPolicy, FeasibilityReport};
use crate::state::Allocation;

/// Counts of each kind of change in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    /// Validators in the pool once the plan has run.
    pub total_validators: usize,
    pub to_remove: usize,
    pub to_add: usize,
    pub to_modify: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSummary {
    pub identity: ReserveAccount,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Removal {
    pub identity: VoteAccount,
    pub stake_account_id: Option<StakeAccount>,
    pub current_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addition {
    pub identity: VoteAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub target_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    pub identity: VoteAccount,
    pub stake_account_id: Option<StakeAccount>,
    pub current_balance: f64,
    pub target_balance: f64,
    /// `target_balance - current_balance`; positive means more stake.
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedValidator {
    pub identity: VoteAccount,
    pub stake_account_id: Option<StakeAccount>,
    pub current_balance: f64,
    pub target_balance: f64,
}

/// A validated redistribution plan.
///
/// Only [`Plan::build`] produces one, and only from a feasible allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: PlanId,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolAddress>,
    pub reserve: ReserveSummary,
    pub summary: PlanSummary,
    pub feasibility: FeasibilityReport,
    pub removals: Vec<Removal>,
    pub additions: Vec<Addition>,
    pub modifications: Vec<Modification>,
    /// Every validator that is in the pool after the plan, kept or added.
    pub validators: Vec<PlannedValidator>,
}

impl Plan {
    /// Validates the allocation and, if feasible, captures it as a plan.
    pub fn build(
        allocation: &Allocation,
        policy: &FeasibilityPolicy,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, PlanError> {
        let feasibility = validate(allocation, policy);
        if !feasibility.is_feasible() {
            return Err(PlanError::Infeasible(Box::new(feasibility)));
        }

        let mut removals = Vec::new();
        let mut additions = Vec::new();
        let mut modifications = Vec::new();
        let mut validators = Vec::new();

        for record in allocation.records() {
            let stake_account_id = record.stake_account().cloned();

            if record.is_removed() {
                removals.push(Removal {
                    identity: record.identity().clone(),
                    stake_account_id,
                    current_balance: record.current_balance(),
                });
                continue;
            }

            if record.is_proposed() {
                additions.push(Addition {
                    identity: record.identity().clone(),
                    display_name: record.display_name().map(str::to_string),
                    target_balance: record.target_balance(),
                });
            } else if record.change() != 0.0 {
                modifications.push(Modification {
                    identity: record.identity().clone(),
                    stake_account_id: stake_account_id.clone(),
                    current_balance: record.current_balance(),
                    target_balance: record.target_balance(),
                    change: record.change(),
                });
            }

            validators.push(PlannedValidator {
                identity: record.identity().clone(),
                stake_account_id,
                current_balance: record.current_balance(),
                target_balance: record.target_balance(),
            });
        }

        let reserve = allocation.reserve();
        Ok(Self {
            plan_id: PlanId::new(),
            generated_at,
            pool: None,
            reserve: ReserveSummary {
                identity: reserve.identity.clone(),
                balance: reserve.balance,
            },
            summary: PlanSummary {
                total_validators: validators.len(),
                to_remove: removals.len(),
                to_add: additions.len(),
                to_modify: modifications.len(),
            },
            feasibility,
            removals,
            additions,
            modifications,
            validators,
        })
    }

    /// Records which pool the plan targets.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolAddress) -> Self {
        self.pool = Some(pool);
        self
    }

    /// True when the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty() && self.modifications.is_empty()
    }
}
