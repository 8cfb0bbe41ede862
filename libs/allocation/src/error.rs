//! Error types for allocation mutation, snapshot loading and plan building.

use stakeplan_id::VoteAccount;
use thiserror::Error;

use crate::feasibility::FeasibilityReport;

/// Errors produced by allocation mutations.
///
/// Every variant is recoverable: the allocation is left exactly as it was
/// before the failed call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    /// The index is outside the combined validator range.
    #[error("validator index {index} is out of range ({len} validators)")]
    InvalidIndex { index: usize, len: usize },

    /// The mutation is structurally disallowed for this validator.
    #[error("{0}")]
    InvalidOperation(String),

    /// The vote account is already part of the allocation.
    #[error("validator {0} is already present")]
    DuplicateValidator(VoteAccount),

    /// No validator with this vote account exists.
    #[error("validator {0} not found")]
    UnknownValidator(VoteAccount),
}

impl AllocationError {
    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::InvalidIndex { .. } => "invalid_index",
            AllocationError::InvalidOperation(_) => "invalid_operation",
            AllocationError::DuplicateValidator(_) => "duplicate_validator",
            AllocationError::UnknownValidator(_) => "unknown_validator",
        }
    }
}

/// Errors produced when turning a snapshot into an allocation.
///
/// A snapshot is accepted whole or not at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// A balance is negative or not a number.
    #[error("invalid {field} for {account}: {value}")]
    InvalidBalance {
        field: &'static str,
        account: String,
        value: f64,
    },

    /// The same vote account appears more than once.
    #[error("vote account {0} appears more than once in the snapshot")]
    DuplicateValidator(VoteAccount),

    /// The allocation refused the snapshot's records.
    #[error("snapshot rejected: {0}")]
    Rejected(#[from] AllocationError),
}

/// Errors produced when building a plan.
#[derive(Debug, Error, Clone)]
pub enum PlanError {
    /// The feasibility check rejected the allocation.
    #[error("plan is not feasible:\n{0}")]
    Infeasible(Box<FeasibilityReport>),
}

impl PlanError {
    /// Returns the rejected feasibility report.
    pub fn report(&self) -> &FeasibilityReport {
        match self {
            PlanError::Infeasible(report) => report,
        }
    }
}
