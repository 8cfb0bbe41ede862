//! Redistribution of stake freed by removed validators.
//!
//! Stake held by validators marked for removal is handed to the validators
//! that stay, lowest target first, until every recipient reaches the equal
//! share point or the freed pool runs dry:
//!
//! ```text
//! freed     = Σ current(removed)
//! per_share = (Σ target(kept) + freed) / |kept|
//! ```
//!
//! Proposed validators never receive freed stake; their targets are set by
//! the operator.

use serde::Serialize;
use stakeplan_id::VoteAccount;

use crate::precision::round_to_precision;
use crate::record::LifecycleAction;
use crate::state::Allocation;

/// Stake moved into one validator's target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub index: usize,
    pub identity: VoteAccount,
    pub previous_target: f64,
    pub new_target: f64,
}

impl Transfer {
    pub fn amount(&self) -> f64 {
        round_to_precision(self.new_target - self.previous_target)
    }
}

/// What a rebalance pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSummary {
    pub freed: f64,
    pub target_per_validator: f64,
    pub transfers: Vec<Transfer>,
    /// Freed stake no recipient could absorb. Non-zero only when every kept
    /// target is too large for `f64` to resolve a single lamport.
    pub unallocated: f64,
}

/// Result of [`rebalance`].
#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceOutcome {
    /// No validator is marked for removal.
    NothingRemoved,

    /// Every existing validator is marked for removal; nothing can receive
    /// the freed stake.
    NoActiveValidators { freed: f64 },

    /// Freed stake was distributed.
    Applied(RebalanceSummary),
}

impl RebalanceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

impl std::fmt::Display for RebalanceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebalanceOutcome::NothingRemoved => {
                write!(f, "no validators are marked for removal; nothing to rebalance")
            }
            RebalanceOutcome::NoActiveValidators { freed } => write!(
                f,
                "{freed} freed but no active validators remain to receive it"
            ),
            RebalanceOutcome::Applied(summary) => {
                write!(
                    f,
                    "redistributed {} across {} validators (equal share {:.9})",
                    summary.freed,
                    summary.transfers.len(),
                    summary.target_per_validator
                )?;
                if summary.unallocated > 0.0 {
                    write!(
                        f,
                        "; {:.9} could not be allocated at lamport precision",
                        summary.unallocated
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Hands stake freed by removed validators to the kept ones.
///
/// Deterministic for a given allocation: recipients are visited in ascending
/// target order, ties in storage order. The sum of kept targets grows by
/// exactly the freed amount (at lamport precision).
pub fn rebalance(allocation: &mut Allocation) -> RebalanceOutcome {
    if allocation.removed().next().is_none() {
        return RebalanceOutcome::NothingRemoved;
    }
    let freed = round_to_precision(allocation.removed().map(|r| r.current_balance()).sum());

    // (index, target) for every kept validator; sort_by is stable, so equal
    // targets stay in storage order
    let mut active: Vec<(usize, f64)> = allocation
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.action() == LifecycleAction::Keep)
        .map(|(index, r)| (index, r.target_balance()))
        .collect();
    if active.is_empty() {
        return RebalanceOutcome::NoActiveValidators { freed };
    }
    active.sort_by(|a, b| a.1.total_cmp(&b.1));

    let kept_total: f64 = active.iter().map(|(_, target)| target).sum();
    let target_per_validator = (kept_total + freed) / active.len() as f64;

    let mut pass = Pass {
        allocation,
        remaining: freed,
        transfers: Vec::new(),
    };

    // Fill the lowest targets first.
    for &(index, before) in &active {
        if pass.remaining <= 0.0 {
            break;
        }
        if before >= target_per_validator {
            continue;
        }
        let amount = (target_per_validator - before).min(pass.remaining);
        pass.credit(index, amount);
    }

    // Rounding can leave a few lamports behind. Spread them evenly; the last
    // validator absorbs whatever the per-share rounding leaves.
    if pass.remaining > 0.0 {
        let share = round_to_precision(pass.remaining / active.len() as f64);
        let last = active.len() - 1;
        for (position, &(index, _)) in active.iter().enumerate() {
            if pass.remaining <= 0.0 {
                break;
            }
            let amount = if position == last {
                pass.remaining
            } else {
                share.min(pass.remaining)
            };
            pass.credit(index, amount);
        }
    }

    // A share credited to a very large target can round away entirely. Offer
    // what is left to each recipient whole, smallest target first.
    for &(index, _) in &active {
        if pass.remaining <= 0.0 {
            break;
        }
        pass.credit(index, pass.remaining);
    }

    let unallocated = round_to_precision(pass.remaining.max(0.0));
    let mut transfers = pass.transfers;
    transfers.sort_by_key(|t| t.index);

    RebalanceOutcome::Applied(RebalanceSummary {
        freed,
        target_per_validator,
        transfers,
        unallocated,
    })
}

struct Pass<'a> {
    allocation: &'a mut Allocation,
    remaining: f64,
    transfers: Vec<Transfer>,
}

impl Pass<'_> {
    fn credit(&mut self, index: usize, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let Ok(record) = self.allocation.record_mut(index) else {
            return;
        };

        let before = record.target_balance();
        let after = round_to_precision(before + amount);
        if after == before {
            return;
        }
        record.set_target(after);
        self.remaining = round_to_precision(self.remaining - (after - before));

        match self.transfers.iter_mut().find(|t| t.index == index) {
            Some(transfer) => transfer.new_target = after,
            None => self.transfers.push(Transfer {
                index,
                identity: record.identity().clone(),
                previous_target: before,
                new_target: after,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precision::to_lamports;
    use crate::record::{Reserve, ValidatorRecord};
    use proptest::prelude::*;
    use stakeplan_id::ReserveAccount;

    fn vote(n: u8) -> VoteAccount {
        VoteAccount::from_bytes(&[n; 32])
    }

    fn allocation(balances: &[f64]) -> Allocation {
        let reserve = Reserve::new(ReserveAccount::from_bytes(&[200; 32]), 0.0);
        let records = balances
            .iter()
            .enumerate()
            .map(|(i, b)| ValidatorRecord::existing(vote(i as u8 + 1), *b, 0.0));
        Allocation::load(reserve, records).unwrap()
    }

    fn kept_sum(state: &Allocation) -> f64 {
        state.kept().map(|r| r.target_balance()).sum()
    }

    fn kept_lamports(state: &Allocation) -> u64 {
        state.kept().map(|r| to_lamports(r.target_balance())).sum()
    }

    #[test]
    fn test_nothing_removed_is_noop() {
        let mut state = allocation(&[10.0, 20.0]);
        let before = state.clone();
        assert_eq!(rebalance(&mut state), RebalanceOutcome::NothingRemoved);
        assert_eq!(state, before);
    }

    #[test]
    fn test_all_removed_reports_no_recipients() {
        let mut state = allocation(&[10.0, 20.0]);
        state.mark_removed(0).unwrap();
        state.mark_removed(1).unwrap();
        let before = state.clone();

        assert_eq!(
            rebalance(&mut state),
            RebalanceOutcome::NoActiveValidators { freed: 30.0 }
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_sole_survivor_takes_everything() {
        let mut state = allocation(&[1000.0, 500.0]);
        state.mark_removed(0).unwrap();

        let outcome = rebalance(&mut state);
        let RebalanceOutcome::Applied(summary) = outcome else {
            panic!("expected rebalance to apply");
        };
        assert_eq!(summary.freed, 1000.0);
        assert_eq!(summary.target_per_validator, 1500.0);
        assert_eq!(summary.transfers.len(), 1);
        assert_eq!(summary.transfers[0].amount(), 1000.0);
        assert_eq!(summary.unallocated, 0.0);
        assert_eq!(state.get(1).unwrap().target_balance(), 1500.0);
        assert_eq!(state.get(0).unwrap().target_balance(), 0.0);
    }

    #[test]
    fn test_fills_lowest_first() {
        // removed validator holds 60; kept targets are [0, 100, 100]
        let mut state = allocation(&[60.0, 0.0, 100.0, 100.0]);
        state.mark_removed(0).unwrap();

        rebalance(&mut state);

        let low = state.get(1).unwrap().target_balance();
        let mid = state.get(2).unwrap().target_balance() - 100.0;
        let high = state.get(3).unwrap().target_balance() - 100.0;
        assert!(low >= mid && low >= high);
        assert_eq!(low, 60.0);
        assert_eq!(mid, 0.0);
        assert_eq!(high, 0.0);
    }

    #[test]
    fn test_flattens_toward_equal_share() {
        let mut state = allocation(&[300.0, 100.0, 200.0, 400.0]);
        state.mark_removed(0).unwrap();

        let RebalanceOutcome::Applied(summary) = rebalance(&mut state) else {
            panic!("expected rebalance to apply");
        };
        // (100 + 200 + 400 + 300) / 3
        assert!((summary.target_per_validator - 1000.0 / 3.0).abs() < 1e-9);
        // 100 gets 233.33 to reach the share, 200 gets the remaining 66.67
        let first = state.get(1).unwrap().target_balance();
        let second = state.get(2).unwrap().target_balance();
        assert_eq!(first, round_to_precision(1000.0 / 3.0));
        assert!((second - (200.0 + 300.0 - (first - 100.0))).abs() < 1e-9);
        assert_eq!(state.get(3).unwrap().target_balance(), 400.0);
        assert!((kept_sum(&state) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_break_by_storage_order() {
        let mut state = allocation(&[5.0, 10.0, 10.0]);
        state.mark_removed(0).unwrap();

        let RebalanceOutcome::Applied(summary) = rebalance(&mut state) else {
            panic!("expected rebalance to apply");
        };
        // share is 12.5 each: first tie gets 2.5, second gets 2.5
        assert_eq!(summary.transfers[0].index, 1);
        assert_eq!(state.get(1).unwrap().target_balance(), 12.5);
        assert_eq!(state.get(2).unwrap().target_balance(), 12.5);
    }

    #[test]
    fn test_proposed_validators_receive_nothing() {
        let mut state = allocation(&[50.0, 10.0]);
        let proposed = state.add_validator(vote(42), None).unwrap();
        state.mark_removed(0).unwrap();

        rebalance(&mut state);

        assert_eq!(state.get(proposed).unwrap().target_balance(), 0.0);
        assert_eq!(state.get(proposed).unwrap().action(), LifecycleAction::Add);
        assert_eq!(state.get(1).unwrap().target_balance(), 60.0);
    }

    #[test]
    fn test_rounding_residue_is_consumed() {
        // 1 lamport shared by three validators cannot be split evenly.
        let mut state = allocation(&[0.000000001, 7.0, 7.0, 7.0]);
        state.mark_removed(0).unwrap();

        rebalance(&mut state);

        let total: f64 = kept_sum(&state);
        assert_eq!(round_to_precision(total), 21.000000001);
    }

    #[test]
    fn test_unresolvable_lamport_is_reported() {
        // above ~9M coins an f64 target cannot move by a single lamport
        let mut state = allocation(&[0.000000001, 40_000_000.0, 40_000_000.0]);
        state.mark_removed(0).unwrap();

        let outcome = rebalance(&mut state);
        let RebalanceOutcome::Applied(summary) = &outcome else {
            panic!("expected rebalance to apply");
        };
        assert_eq!(summary.freed, 0.000000001);
        assert_eq!(summary.unallocated, 0.000000001);
        assert!(summary.transfers.is_empty());
        assert!(outcome
            .to_string()
            .contains("0.000000001 could not be allocated at lamport precision"));
    }

    #[test]
    fn test_rebalance_is_deterministic() {
        let build = || {
            let mut state = allocation(&[12.5, 3.3, 7.7, 3.3, 9.1]);
            state.mark_removed(0).unwrap();
            state.mark_removed(4).unwrap();
            state
        };
        let mut a = build();
        let mut b = build();
        assert_eq!(rebalance(&mut a), rebalance(&mut b));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn test_rebalance_conserves_stake(
            lamports in proptest::collection::vec(0u64..10_000_000_000_000, 2..30),
            removed in proptest::collection::vec(any::<bool>(), 30),
        ) {
            let balances: Vec<f64> = lamports.iter().map(|l| *l as f64 / 1e9).collect();
            let mut state = allocation(&balances);
            for (index, remove) in removed.iter().take(balances.len()).enumerate() {
                if *remove {
                    state.mark_removed(index).unwrap();
                }
            }
            let removed_lamports: u64 = state.removed().map(|r| to_lamports(r.current_balance())).sum();
            let before = kept_lamports(&state);

            let outcome = rebalance(&mut state);

            if state.kept().next().is_some() && state.removed().next().is_some() {
                prop_assert!(outcome.is_applied());
                prop_assert_eq!(kept_lamports(&state), before + removed_lamports);
            } else {
                prop_assert!(!outcome.is_applied());
            }
            for record in state.removed() {
                prop_assert_eq!(record.target_balance(), 0.0);
            }
        }

        #[test]
        fn test_rebalance_never_lowers_a_target(
            lamports in proptest::collection::vec(0u64..1_000_000_000_000, 2..20),
        ) {
            let balances: Vec<f64> = lamports.iter().map(|l| *l as f64 / 1e9).collect();
            let mut state = allocation(&balances);
            state.mark_removed(0).unwrap();
            let before: Vec<f64> = state.records().iter().map(|r| r.target_balance()).collect();

            rebalance(&mut state);

            for (record, previous) in state.records().iter().zip(before) {
                prop_assert!(record.target_balance() >= previous);
            }
        }
    }
}
