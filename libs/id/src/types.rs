//! Typed address and ID definitions.
//!
//! Each address kind is its own type. All of them share the same base58
//! encoding of a 32-byte public key.

use crate::{define_address, define_id};

// =============================================================================
// Pool accounts
// =============================================================================

define_address!(PoolAddress, "stake pool");
define_address!(ReserveAccount, "reserve stake account");

// =============================================================================
// Validator accounts
// =============================================================================

define_address!(VoteAccount, "vote account");
define_address!(StakeAccount, "stake account");

// =============================================================================
// Plans
// =============================================================================

define_id!(PlanId, "plan");

// =============================================================================
// Tests
// =============================================================================
