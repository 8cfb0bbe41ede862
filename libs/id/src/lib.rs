//! # stakeplan-id
//!
//! Typed addresses and identifiers used by the stake planner.
//!
//! ## Design Principles
//!
//! - Addresses are opaque keys; display names are presentational labels
//! - Every address has one canonical base58 form with strict parsing
//! - Address kinds are distinct types so a stake account can never be
//!   passed where a vote account is expected
//!
//! ## Formats
//!
//! On-chain addresses are base58-encoded 32-byte public keys:
//!
//! - `Vote111111111111111111111111111111111111111`
//!
//! Plans produced by the planner carry a prefixed ULID:
//!
//! - `plan_01HV4Z2WQXKJNM8GPQY6VBKC3D`

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

/// Length in bytes of a decoded on-chain address.
pub const ADDRESS_LEN: usize = 32;

#[doc(hidden)]
pub use bs58;
