//! Lamport-precision arithmetic for coin amounts.
//!
//! Balances are carried as `f64` whole coins. Every derived target is rounded
//! back to nine decimal places so repeated adjustments never drift.

/// Number of decimal places kept on every amount.
pub const PRECISION_DECIMALS: u32 = 9;

/// Lamports in one whole coin.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Slack used when comparing aggregate amounts in feasibility checks.
pub const TOLERANCE: f64 = 0.01;

/// Rounds an amount to lamport precision.
pub fn round_to_precision(amount: f64) -> f64 {
    (amount * LAMPORTS_PER_SOL).round() / LAMPORTS_PER_SOL
}

/// Converts a whole-coin amount to lamports, saturating at zero for
/// negative inputs.
pub fn to_lamports(amount: f64) -> u64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * LAMPORTS_PER_SOL).round() as u64
}
