//! The allocation aggregate and its mutation operations.
//!
//! Records live in one ordered sequence: validators loaded from the snapshot
//! first, in snapshot order, followed by proposed validators in the order the
//! operator added them. That storage position is the index every command
//! uses. Display order is derived separately by [`Allocation::display_order`]
//! and never feeds back into indexing.

use std::collections::BTreeMap;

use stakeplan_id::VoteAccount;

use crate::error::AllocationError;
use crate::precision::round_to_precision;
use crate::record::{LifecycleAction, Reserve, ValidatorRecord};

/// Validators, proposed validators and reserve liquidity for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    records: Vec<ValidatorRecord>,
    positions: BTreeMap<VoteAccount, usize>,
    reserve: Reserve,
}

impl Allocation {
    /// Builds an allocation from existing validators.
    ///
    /// Every record is loaded as `keep` with its target at the current
    /// balance, whatever state it arrived in.
    pub fn load(
        reserve: Reserve,
        validators: impl IntoIterator<Item = ValidatorRecord>,
    ) -> Result<Self, AllocationError> {
        let mut allocation = Self {
            records: Vec::new(),
            positions: BTreeMap::new(),
            reserve,
        };

        for mut record in validators {
            if allocation.positions.contains_key(record.identity()) {
                return Err(AllocationError::DuplicateValidator(record.identity().clone()));
            }
            record.set_action(LifecycleAction::Keep);
            record.set_target(record.current_balance());
            allocation.push(record);
        }

        Ok(allocation)
    }

    fn push(&mut self, record: ValidatorRecord) -> usize {
        let index = self.records.len();
        self.positions.insert(record.identity().clone(), index);
        self.records.push(record);
        index
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn reserve(&self) -> &Reserve {
        &self.reserve
    }

    /// Number of validators across both sequences.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ValidatorRecord> {
        self.records.get(index)
    }

    pub fn position_of(&self, identity: &VoteAccount) -> Option<usize> {
        self.positions.get(identity).copied()
    }

    pub fn get_by_identity(&self, identity: &VoteAccount) -> Option<&ValidatorRecord> {
        self.position_of(identity).map(|index| &self.records[index])
    }

    pub fn contains(&self, identity: &VoteAccount) -> bool {
        self.positions.contains_key(identity)
    }

    /// All records in storage order.
    pub fn records(&self) -> &[ValidatorRecord] {
        &self.records
    }

    /// Validators loaded from the snapshot, in snapshot order.
    pub fn existing(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.records.iter().filter(|r| r.is_existing())
    }

    /// Validators proposed for addition, in the order they were added.
    pub fn proposed(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.records.iter().filter(|r| r.is_proposed())
    }

    /// Existing validators marked for removal.
    pub fn removed(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.records.iter().filter(|r| r.is_removed())
    }

    /// Existing validators that stay in the pool.
    pub fn kept(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.records
            .iter()
            .filter(|r| r.action() == LifecycleAction::Keep)
    }

    /// Storage indices sorted for display: highest target first, ties in
    /// storage order.
    pub fn display_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| {
            self.records[b]
                .target_balance()
                .total_cmp(&self.records[a].target_balance())
        });
        order
    }

    pub fn has_changes(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.action() != LifecycleAction::Keep || r.change() != 0.0)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Marks an existing validator for removal and zeroes its target.
    pub fn mark_removed(&mut self, index: usize) -> Result<(), AllocationError> {
        let record = self.existing_mut(index, "removed")?;
        record.set_action(LifecycleAction::Remove);
        record.set_target(0.0);
        Ok(())
    }

    /// Returns a removed validator to `keep` and resets its target to the
    /// current balance. Any earlier manual target is discarded.
    pub fn undo_removed(&mut self, index: usize) -> Result<(), AllocationError> {
        let record = self.existing_mut(index, "restored")?;
        record.set_action(LifecycleAction::Keep);
        let current = record.current_balance();
        record.set_target(current);
        Ok(())
    }

    /// Sets a target verbatim. The lifecycle action is left alone.
    ///
    /// A validator marked for removal keeps its zero target; undo first.
    pub fn set_target(&mut self, index: usize, amount: f64) -> Result<(), AllocationError> {
        if !amount.is_finite() {
            return Err(AllocationError::invalid_operation(
                "target must be a finite number",
            ));
        }
        let record = self.record_mut(index)?;
        if record.is_removed() {
            return Err(AllocationError::invalid_operation(
                "cannot set the target of a validator marked for removal; undo first",
            ));
        }
        record.set_target(amount);
        Ok(())
    }

    /// Adds `delta` to a target, rounding to lamport precision.
    pub fn add_to_target(&mut self, index: usize, delta: f64) -> Result<(), AllocationError> {
        let target = self.adjusted_target(index, delta)?;
        self.records[index].set_target(target);
        Ok(())
    }

    /// Subtracts `delta` from a target, rounding to lamport precision.
    ///
    /// Fails without touching the record if the result would be negative.
    pub fn subtract_from_target(
        &mut self,
        index: usize,
        delta: f64,
    ) -> Result<(), AllocationError> {
        let target = self.adjusted_target(index, -delta)?;
        if target < 0.0 {
            let record = &self.records[index];
            return Err(AllocationError::invalid_operation(format!(
                "cannot subtract {delta} from {}: target would become {target}",
                record.label()
            )));
        }
        self.records[index].set_target(target);
        Ok(())
    }

    /// Proposes a new validator. Returns its storage index.
    pub fn add_validator(
        &mut self,
        identity: VoteAccount,
        display_name: Option<String>,
    ) -> Result<usize, AllocationError> {
        if self.contains(&identity) {
            return Err(AllocationError::DuplicateValidator(identity));
        }
        Ok(self.push(ValidatorRecord::proposed(identity, display_name)))
    }

    /// Replaces the display name of a validator.
    pub fn set_display_name(
        &mut self,
        identity: &VoteAccount,
        name: Option<String>,
    ) -> Result<(), AllocationError> {
        let index = self
            .position_of(identity)
            .ok_or_else(|| AllocationError::UnknownValidator(identity.clone()))?;
        self.records[index].set_display_name(name);
        Ok(())
    }

    fn adjusted_target(&self, index: usize, delta: f64) -> Result<f64, AllocationError> {
        if !delta.is_finite() {
            return Err(AllocationError::invalid_operation(
                "adjustment must be a finite number",
            ));
        }
        let record = self.record(index)?;
        if record.is_removed() {
            return Err(AllocationError::invalid_operation(
                "cannot adjust a validator marked for removal; undo first",
            ));
        }
        Ok(round_to_precision(record.target_balance() + delta))
    }

    fn record(&self, index: usize) -> Result<&ValidatorRecord, AllocationError> {
        let len = self.records.len();
        self.records
            .get(index)
            .ok_or(AllocationError::InvalidIndex { index, len })
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> Result<&mut ValidatorRecord, AllocationError> {
        let len = self.records.len();
        self.records
            .get_mut(index)
            .ok_or(AllocationError::InvalidIndex { index, len })
    }

    fn existing_mut(
        &mut self,
        index: usize,
        verb: &str,
    ) -> Result<&mut ValidatorRecord, AllocationError> {
        let record = self.record_mut(index)?;
        if record.is_proposed() {
            return Err(AllocationError::invalid_operation(format!(
                "{} is a proposed validator; only existing validators can be {verb}",
                record.label()
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
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

    #[test]
    fn test_load_rejects_duplicates() {
        let reserve = Reserve::new(ReserveAccount::from_bytes(&[200; 32]), 0.0);
        let records = vec![
            ValidatorRecord::existing(vote(1), 10.0, 0.0),
            ValidatorRecord::existing(vote(1), 20.0, 0.0),
        ];
        let result = Allocation::load(reserve, records);
        assert_eq!(result, Err(AllocationError::DuplicateValidator(vote(1))));
    }

    #[test]
    fn test_mark_removed_zeroes_target() {
        let mut state = allocation(&[100.0, 50.0]);
        state.mark_removed(0).unwrap();

        let record = state.get(0).unwrap();
        assert_eq!(record.action(), LifecycleAction::Remove);
        assert_eq!(record.target_balance(), 0.0);
        assert_eq!(record.current_balance(), 100.0);

        // idempotent
        state.mark_removed(0).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 0.0);
    }

    #[test]
    fn test_undo_discards_manual_target() {
        let mut state = allocation(&[100.0]);
        state.set_target(0, 42.0).unwrap();
        state.mark_removed(0).unwrap();
        state.undo_removed(0).unwrap();

        let record = state.get(0).unwrap();
        assert_eq!(record.action(), LifecycleAction::Keep);
        assert_eq!(record.target_balance(), 100.0);
    }

    #[test]
    fn test_remove_rejects_proposed_validator() {
        let mut state = allocation(&[100.0]);
        let index = state.add_validator(vote(9), None).unwrap();

        let err = state.mark_removed(index).unwrap_err();
        assert_eq!(err.code(), "invalid_operation");
        assert_eq!(state.get(index).unwrap().action(), LifecycleAction::Add);

        let err = state.undo_removed(index).unwrap_err();
        assert_eq!(err.code(), "invalid_operation");
    }

    #[rstest]
    #[case::first_past_end(2)]
    #[case::far_past_end(99)]
    fn test_out_of_range_index(#[case] index: usize) {
        let mut state = allocation(&[1.0, 2.0]);
        let before = state.clone();

        assert_eq!(
            state.mark_removed(index),
            Err(AllocationError::InvalidIndex { index, len: 2 })
        );
        assert!(state.set_target(index, 5.0).is_err());
        assert!(state.add_to_target(index, 5.0).is_err());
        assert!(state.subtract_from_target(index, 5.0).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_set_target_is_verbatim() {
        let mut state = allocation(&[100.0]);
        state.set_target(0, 12.3456789012345).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 12.3456789012345);
        assert_eq!(state.get(0).unwrap().action(), LifecycleAction::Keep);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn test_set_target_rejects_non_finite(#[case] amount: f64) {
        let mut state = allocation(&[100.0]);
        assert!(state.set_target(0, amount).is_err());
        assert_eq!(state.get(0).unwrap().target_balance(), 100.0);
    }

    #[test]
    fn test_set_target_works_on_proposed() {
        let mut state = allocation(&[100.0]);
        let index = state.add_validator(vote(9), None).unwrap();
        state.set_target(index, 7.5).unwrap();
        assert_eq!(state.get(index).unwrap().target_balance(), 7.5);
        assert_eq!(state.get(index).unwrap().action(), LifecycleAction::Add);
    }

    #[test]
    fn test_set_target_rejects_removed_validator() {
        let mut state = allocation(&[100.0, 50.0]);
        state.mark_removed(0).unwrap();
        let before = state.clone();

        let err = state.set_target(0, 3.0).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InvalidOperation(
                "cannot set the target of a validator marked for removal; undo first"
                    .to_string()
            )
        );
        assert_eq!(state, before);
        assert_eq!(state.get(0).unwrap().target_balance(), 0.0);
        assert_eq!(state.get(0).unwrap().action(), LifecycleAction::Remove);

        // after undo the target is editable again
        state.undo_removed(0).unwrap();
        state.set_target(0, 3.0).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 3.0);
    }

    #[test]
    fn test_adjust_rejects_removed_validator() {
        let mut state = allocation(&[100.0]);
        state.mark_removed(0).unwrap();

        let err = state.add_to_target(0, 1.0).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InvalidOperation(
                "cannot adjust a validator marked for removal; undo first".to_string()
            )
        );
        assert!(state.subtract_from_target(0, 1.0).is_err());
        assert_eq!(state.get(0).unwrap().target_balance(), 0.0);
    }

    #[test]
    fn test_subtract_below_zero_leaves_state() {
        let mut state = allocation(&[10.0]);
        let before = state.clone();

        let err = state.subtract_from_target(0, 10.5).unwrap_err();
        assert_eq!(err.code(), "invalid_operation");
        assert_eq!(state, before);

        state.subtract_from_target(0, 10.0).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 0.0);
    }

    #[test]
    fn test_adjustments_round_to_lamports() {
        let mut state = allocation(&[0.1]);
        state.add_to_target(0, 0.2).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 0.3);

        state.subtract_from_target(0, 0.1).unwrap();
        assert_eq!(state.get(0).unwrap().target_balance(), 0.2);
    }

    #[test]
    fn test_hundred_single_lamport_steps() {
        let mut state = allocation(&[0.0]);
        for _ in 0..100 {
            state.add_to_target(0, 0.000000001).unwrap();
        }
        let target = state.get(0).unwrap().target_balance();
        assert!((target - 0.0000001).abs() < 1e-9);
        assert_eq!(target, round_to_precision(0.0000001));
    }

    #[test]
    fn test_add_validator_appends_after_existing() {
        let mut state = allocation(&[5.0, 6.0]);
        let index = state
            .add_validator(vote(9), Some("New One".to_string()))
            .unwrap();

        assert_eq!(index, 2);
        let record = state.get(2).unwrap();
        assert_eq!(record.action(), LifecycleAction::Add);
        assert_eq!(record.current_balance(), 0.0);
        assert_eq!(record.target_balance(), 0.0);
        assert_eq!(state.proposed().count(), 1);
        assert_eq!(state.existing().count(), 2);
        assert_eq!(state.position_of(&vote(9)), Some(2));
    }

    #[test]
    fn test_add_validator_twice_is_rejected() {
        let mut state = allocation(&[5.0]);
        state.add_validator(vote(9), None).unwrap();

        let err = state.add_validator(vote(9), None).unwrap_err();
        assert_eq!(err, AllocationError::DuplicateValidator(vote(9)));
        assert_eq!(state.proposed().count(), 1);
    }

    #[test]
    fn test_add_validator_rejects_existing_identity() {
        let mut state = allocation(&[5.0]);
        let err = state.add_validator(vote(1), None).unwrap_err();
        assert_eq!(err, AllocationError::DuplicateValidator(vote(1)));
        assert!(state.proposed().next().is_none());
    }

    #[test]
    fn test_display_order_is_separate_from_storage() {
        let mut state = allocation(&[10.0, 30.0, 20.0, 30.0]);
        assert_eq!(state.display_order(), vec![1, 3, 2, 0]);

        // Indices keep addressing storage positions after a re-sort.
        state.set_target(0, 100.0).unwrap();
        assert_eq!(state.display_order(), vec![0, 1, 3, 2]);
        state.mark_removed(2).unwrap();
        assert_eq!(state.get(2).unwrap().current_balance(), 20.0);
    }

    #[test]
    fn test_set_display_name() {
        let mut state = allocation(&[5.0]);
        state
            .set_display_name(&vote(1), Some("Alpha".to_string()))
            .unwrap();
        assert_eq!(state.get(0).unwrap().display_name(), Some("Alpha"));

        let err = state.set_display_name(&vote(8), None).unwrap_err();
        assert_eq!(err, AllocationError::UnknownValidator(vote(8)));
    }

    #[test]
    fn test_has_changes() {
        let mut state = allocation(&[5.0]);
        assert!(!state.has_changes());
        state.add_to_target(0, 1.0).unwrap();
        assert!(state.has_changes());
        state.subtract_from_target(0, 1.0).unwrap();
        assert!(!state.has_changes());
    }

    proptest! {
        #[test]
        fn test_remove_then_undo_restores_current(
            balances in proptest::collection::vec(0.0f64..1.0e6, 1..20),
            pick in any::<proptest::sample::Index>(),
            edit in 0.0f64..1.0e6,
        ) {
            let mut state = allocation(&balances);
            let index = pick.index(balances.len());
            state.set_target(index, edit).unwrap();

            state.mark_removed(index).unwrap();
            let record = state.get(index).unwrap();
            prop_assert_eq!(record.target_balance(), 0.0);
            prop_assert_eq!(record.action(), LifecycleAction::Remove);

            state.undo_removed(index).unwrap();
            let record = state.get(index).unwrap();
            prop_assert_eq!(record.target_balance(), record.current_balance());
            prop_assert_eq!(record.action(), LifecycleAction::Keep);
        }
    }
}
