//! # stakeplan-allocation
//!
//! The allocation planning engine. Given a snapshot of a stake pool's
//! validators and reserve, it models the *current* stake of each validator
//! next to the operator's *target* stake and converges the two into a plan.
//!
//! - **Current balance**: stake active at a validator when the snapshot was
//!   taken. Never changes after load.
//! - **Target balance**: stake the validator should hold once the plan runs.
//! - **Lifecycle action**: whether a validator is kept, removed from the
//!   pool, or added to it.
//!
//! # Invariants
//!
//! - Vote accounts are unique across existing and proposed validators
//! - A removed validator always has a target of zero
//! - Failed mutations leave the allocation untouched
//! - Target arithmetic is rounded to lamport precision after every step
//! - Rebalancing never creates or destroys stake
//!
//! The crate does no I/O; snapshots come in and plans go out as plain data.

mod error;
mod feasibility;
mod plan;
mod precision;
mod rebalance;
mod record;
mod snapshot;
mod state;

pub use error::{AllocationError, PlanError, SnapshotError};
pub use feasibility::{validate, FeasibilityPolicy, FeasibilityReport, Violation};
pub use plan::{Addition, Modification, Plan, PlanSummary, PlannedValidator, Removal, ReserveSummary};
pub use precision::{
    round_to_precision, to_lamports, LAMPORTS_PER_SOL, PRECISION_DECIMALS, TOLERANCE,
};
pub use rebalance::{rebalance, RebalanceOutcome, RebalanceSummary, Transfer};
pub use record::{LifecycleAction, Reserve, ValidatorRecord};
pub use snapshot::{Snapshot, SnapshotValidator};
pub use state::Allocation;
