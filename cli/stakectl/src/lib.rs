//! Library half of the `stakeplan` binary.
//!
//! The planning engine itself lives in `stakeplan-allocation`. This crate
//! wires it to its collaborators:
//!
//! - **Providers**: fetch a pool snapshot over HTTP or from a file, with a
//!   last-known snapshot cache as fallback
//! - **Names**: optional display-name lookup from a metadata service
//! - **Session**: the line-oriented command loop an operator drives
//! - **Export**: plan file with a derived operation list and fingerprint

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod names;
pub mod output;
pub mod provider;
pub mod session;
