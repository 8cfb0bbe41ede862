//! Feasibility check run before a plan may be exported.
//!
//! Stake for increases and additions can only come from the reserve plus
//! whatever is being removed or decreased elsewhere:
//!
//! ```text
//! increased ≤ reserve + removed + decreased + tolerance
//! Σ target  ≥ active × min_stake_per_validator − tolerance
//! ```
//!
//! A failed check is a normal result carrying its diagnostics, not an error.

use serde::{Deserialize, Serialize};
use stakeplan_id::VoteAccount;

use crate::precision::{round_to_precision, TOLERANCE};
use crate::state::Allocation;

/// Tunable limits for the feasibility check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityPolicy {
    /// Minimum operable stake per active validator, in whole coins.
    pub min_stake_per_validator: f64,

    /// Slack absorbing floating point rounding in aggregate comparisons.
    pub tolerance: f64,
}

impl Default for FeasibilityPolicy {
    fn default() -> Self {
        Self {
            min_stake_per_validator: 1.0,
            tolerance: TOLERANCE,
        }
    }
}

impl FeasibilityPolicy {
    pub fn with_min_stake(min_stake_per_validator: f64) -> Self {
        Self {
            min_stake_per_validator,
            ..Self::default()
        }
    }
}

/// A rule the allocation breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    /// Increases and additions need more stake than is being freed.
    InsufficientLiquidity { required: f64, available: f64 },

    /// Targets do not cover the per-validator minimum.
    BelowMinimumStake { total_target: f64, minimum_required: f64 },

    /// A target is negative or not a number.
    NegativeTarget { identity: VoteAccount, target: f64 },
}

impl Violation {
    /// How far the allocation is from satisfying the rule.
    pub fn shortfall(&self) -> f64 {
        match self {
            Violation::InsufficientLiquidity {
                required,
                available,
            } => round_to_precision(required - available),
            Violation::BelowMinimumStake {
                total_target,
                minimum_required,
            } => round_to_precision(minimum_required - total_target),
            Violation::NegativeTarget { target, .. } => -target,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::InsufficientLiquidity {
                required,
                available,
            } => write!(
                f,
                "insufficient liquidity: increases need {required:.9} but only {available:.9} is available (short by {:.9})",
                self.shortfall()
            ),
            Violation::BelowMinimumStake {
                total_target,
                minimum_required,
            } => write!(
                f,
                "below minimum stake: targets total {total_target:.9} but active validators need at least {minimum_required:.9} (short by {:.9})",
                self.shortfall()
            ),
            Violation::NegativeTarget { identity, target } => {
                write!(f, "negative target: {identity} has target {target}")
            }
        }
    }
}

/// Totals computed by the feasibility check and the rules that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityReport {
    pub total_current: f64,
    pub total_target: f64,
    pub removed_stake: f64,
    pub decreased_stake: f64,
    pub increased_stake: f64,
    pub reserve_balance: f64,
    pub available_reserve: f64,
    pub active_validators: usize,
    pub minimum_required: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl FeasibilityReport {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    /// Reserve left over once every increase is funded. Negative when the
    /// plan is short.
    pub fn headroom(&self) -> f64 {
        round_to_precision(self.available_reserve - self.increased_stake)
    }
}

impl std::fmt::Display for FeasibilityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_feasible() {
            return write!(
                f,
                "feasible: {:.9} of increases funded from {:.9} available ({} active validators)",
                self.increased_stake, self.available_reserve, self.active_validators
            );
        }
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {violation}")?;
        }
        Ok(())
    }
}

/// Checks whether the allocation's targets can be funded.
pub fn validate(allocation: &Allocation, policy: &FeasibilityPolicy) -> FeasibilityReport {
    let mut total_current = 0.0;
    let mut total_target = 0.0;
    let mut removed_stake = 0.0;
    let mut decreased_stake = 0.0;
    let mut increased_stake = 0.0;
    let mut active_validators = 0usize;
    let mut violations = Vec::new();

    for record in allocation.records() {
        let current = record.current_balance();
        let target = record.target_balance();

        if record.is_existing() {
            total_current += current;
        }

        if record.is_removed() {
            removed_stake += current;
            continue;
        }

        if !target.is_finite() || target < 0.0 {
            violations.push(Violation::NegativeTarget {
                identity: record.identity().clone(),
                target,
            });
        }

        active_validators += 1;
        total_target += target;
        if record.is_proposed() {
            increased_stake += target;
        } else if target > current {
            increased_stake += target - current;
        } else {
            decreased_stake += current - target;
        }
    }

    let reserve_balance = allocation.reserve().balance;
    let total_current = round_to_precision(total_current);
    let total_target = round_to_precision(total_target);
    let removed_stake = round_to_precision(removed_stake);
    let decreased_stake = round_to_precision(decreased_stake);
    let increased_stake = round_to_precision(increased_stake);
    let available_reserve = round_to_precision(reserve_balance + removed_stake + decreased_stake);
    let minimum_required =
        round_to_precision(active_validators as f64 * policy.min_stake_per_validator);

    if increased_stake > available_reserve + policy.tolerance {
        violations.push(Violation::InsufficientLiquidity {
            required: increased_stake,
            available: available_reserve,
        });
    }

    if total_target < minimum_required - policy.tolerance {
        violations.push(Violation::BelowMinimumStake {
            total_target,
            minimum_required,
        });
    }

    FeasibilityReport {
        total_current,
        total_target,
        removed_stake,
        decreased_stake,
        increased_stake,
        reserve_balance,
        available_reserve,
        active_validators,
        minimum_required,
        violations,
    }
}
