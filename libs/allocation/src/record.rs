//! Validator records and the reserve account.

use serde::{Deserialize, Serialize};
use stakeplan_id::{ReserveAccount, StakeAccount, VoteAccount};

/// What the plan does with a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Validator stays in the pool; its target may differ from current.
    #[default]
    Keep,

    /// Validator leaves the pool; its target is zero.
    Remove,

    /// Validator is not in the pool yet and will be added.
    Add,
}

impl LifecycleAction {
    /// Returns the lowercase label used in tables and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Keep => "keep",
            LifecycleAction::Remove => "remove",
            LifecycleAction::Add => "add",
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current and target stake for one validator.
///
/// The current and pending balances are fixed when the record is built. The
/// target and the lifecycle action only change through
/// [`Allocation`](crate::Allocation).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecord {
    identity: VoteAccount,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stake_account: Option<StakeAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transient_stake_account: Option<StakeAccount>,
    current_balance: f64,
    pending_balance: f64,
    target_balance: f64,
    action: LifecycleAction,
}

impl ValidatorRecord {
    /// A validator already in the pool. The target starts at the current
    /// balance.
    pub fn existing(identity: VoteAccount, current_balance: f64, pending_balance: f64) -> Self {
        Self {
            identity,
            display_name: None,
            stake_account: None,
            transient_stake_account: None,
            current_balance,
            pending_balance,
            target_balance: current_balance,
            action: LifecycleAction::Keep,
        }
    }

    /// A validator proposed for addition. It holds no stake yet.
    pub fn proposed(identity: VoteAccount, display_name: Option<String>) -> Self {
        Self {
            identity,
            display_name: normalize_name(display_name),
            stake_account: None,
            transient_stake_account: None,
            current_balance: 0.0,
            pending_balance: 0.0,
            target_balance: 0.0,
            action: LifecycleAction::Add,
        }
    }

    /// Attaches a display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = normalize_name(Some(name.into()));
        self
    }

    /// Attaches the validator's stake accounts.
    #[must_use]
    pub fn with_stake_accounts(
        mut self,
        stake_account: StakeAccount,
        transient_stake_account: Option<StakeAccount>,
    ) -> Self {
        self.stake_account = Some(stake_account);
        self.transient_stake_account = transient_stake_account;
        self
    }

    pub fn identity(&self) -> &VoteAccount {
        &self.identity
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn stake_account(&self) -> Option<&StakeAccount> {
        self.stake_account.as_ref()
    }

    pub fn transient_stake_account(&self) -> Option<&StakeAccount> {
        self.transient_stake_account.as_ref()
    }

    pub fn current_balance(&self) -> f64 {
        self.current_balance
    }

    /// Stake activating or deactivating. Informational only.
    pub fn pending_balance(&self) -> f64 {
        self.pending_balance
    }

    pub fn target_balance(&self) -> f64 {
        self.target_balance
    }

    pub fn action(&self) -> LifecycleAction {
        self.action
    }

    /// Signed difference between target and current.
    pub fn change(&self) -> f64 {
        crate::round_to_precision(self.target_balance - self.current_balance)
    }

    /// True for validators already in the pool (kept or removed).
    pub fn is_existing(&self) -> bool {
        self.action != LifecycleAction::Add
    }

    pub fn is_removed(&self) -> bool {
        self.action == LifecycleAction::Remove
    }

    pub fn is_proposed(&self) -> bool {
        self.action == LifecycleAction::Add
    }

    /// Display name if known, otherwise the vote account.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.identity.to_string(),
        }
    }

    pub(crate) fn set_target(&mut self, target: f64) {
        self.target_balance = target;
    }

    pub(crate) fn set_action(&mut self, action: LifecycleAction) {
        self.action = action;
    }

    pub(crate) fn set_display_name(&mut self, name: Option<String>) {
        self.display_name = normalize_name(name);
    }
}

fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Unallocated liquidity held by the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reserve {
    pub identity: ReserveAccount,
    pub balance: f64,
}

impl Reserve {
    pub fn new(identity: ReserveAccount, balance: f64) -> Self {
        Self { identity, balance }
    }
}
