//! End-to-end planning flow: snapshot → edits → rebalance → validate → plan.

use chrono::Utc;
use stakeplan_allocation::{
    rebalance, validate, FeasibilityPolicy, LifecycleAction, Plan, RebalanceOutcome, Snapshot,
    SnapshotValidator,
};
use stakeplan_id::{ReserveAccount, StakeAccount, VoteAccount};

fn validator(n: u8, name: &str, active: f64) -> SnapshotValidator {
    SnapshotValidator {
        vote_account: VoteAccount::from_bytes(&[n; 32]),
        name: Some(name.to_string()),
        stake_account: StakeAccount::from_bytes(&[n + 50; 32]),
        active_balance: active,
        transient_stake_account: StakeAccount::from_bytes(&[n + 100; 32]),
        transient_balance: 0.0,
    }
}

fn snapshot(reserve: f64, validators: Vec<SnapshotValidator>) -> Snapshot {
    Snapshot {
        pool_address: None,
        fetched_at: Some(Utc::now()),
        reserve_account_id: ReserveAccount::from_bytes(&[200; 32]),
        reserve_balance: reserve,
        validators,
    }
}

#[test]
fn test_remove_rebalance_validate_export() {
    let snapshot = snapshot(
        0.0,
        vec![validator(1, "A", 1000.0), validator(2, "B", 500.0)],
    );
    let mut state = snapshot.to_allocation().unwrap();

    let a = state.position_of(&VoteAccount::from_bytes(&[1; 32])).unwrap();
    let b = state.position_of(&VoteAccount::from_bytes(&[2; 32])).unwrap();

    state.mark_removed(a).unwrap();
    let outcome = rebalance(&mut state);
    assert!(outcome.is_applied(), "{outcome}");
    assert_eq!(state.get(b).unwrap().target_balance(), 1500.0);

    let policy = FeasibilityPolicy::default();
    let report = validate(&state, &policy);
    assert!(report.is_feasible(), "{report}");

    let plan = Plan::build(&state, &policy, Utc::now()).unwrap();
    assert_eq!(plan.removals.len(), 1);
    assert_eq!(plan.removals[0].identity, VoteAccount::from_bytes(&[1; 32]));
    assert_eq!(plan.removals[0].current_balance, 1000.0);
    assert_eq!(plan.modifications.len(), 1);
    assert_eq!(plan.modifications[0].identity, VoteAccount::from_bytes(&[2; 32]));
    assert_eq!(plan.modifications[0].change, 1000.0);
    assert_eq!(plan.summary.total_validators, 1);
}

#[test]
fn test_undo_before_export_restores_original_plan() {
    let snapshot = snapshot(
        10.0,
        vec![
            validator(1, "A", 300.0),
            validator(2, "B", 100.0),
            validator(3, "C", 200.0),
        ],
    );
    let mut state = snapshot.to_allocation().unwrap();

    state.mark_removed(0).unwrap();
    state.undo_removed(0).unwrap();
    assert_eq!(rebalance(&mut state), RebalanceOutcome::NothingRemoved);

    let plan = Plan::build(&state, &FeasibilityPolicy::default(), Utc::now()).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.summary.total_validators, 3);
}

#[test]
fn test_failed_commands_do_not_corrupt_state() {
    let snapshot = snapshot(0.0, vec![validator(1, "A", 10.0), validator(2, "B", 20.0)]);
    let mut state = snapshot.to_allocation().unwrap();
    let before = state.clone();

    assert!(state.mark_removed(7).is_err());
    assert!(state.subtract_from_target(0, 11.0).is_err());
    assert!(state
        .add_validator(VoteAccount::from_bytes(&[2; 32]), None)
        .is_err());
    assert!(state.set_target(1, f64::NAN).is_err());

    assert_eq!(state, before);
}

#[test]
fn test_added_validator_funded_by_removal() {
    let snapshot = snapshot(
        0.0,
        vec![validator(1, "A", 40.0), validator(2, "B", 60.0)],
    );
    let mut state = snapshot.to_allocation().unwrap();

    state.mark_removed(0).unwrap();
    let added = state
        .add_validator(VoteAccount::from_bytes(&[9; 32]), Some("Z".to_string()))
        .unwrap();
    state.add_to_target(added, 40.0).unwrap();

    let record = state.get(added).unwrap();
    assert_eq!(record.action(), LifecycleAction::Add);

    let report = validate(&state, &FeasibilityPolicy::default());
    assert!(report.is_feasible(), "{report}");
    assert_eq!(report.increased_stake, 40.0);
    assert_eq!(report.available_reserve, 40.0);

    // rebalancing afterwards would double-spend the removed stake
    rebalance(&mut state);
    let report = validate(&state, &FeasibilityPolicy::default());
    assert!(!report.is_feasible());
}
