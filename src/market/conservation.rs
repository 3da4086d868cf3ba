// ============================================================================
// Conservation Verifier - Pulse Market Engine
// ============================================================================
//
// The property that total funds in equal total funds distributed:
//
//   platform_fee + validator_fee + creator_fee + Σ payout == total_pool
//
// up to a fixed absolute tolerance for floating-point drift. Settlement
// runs this before returning a result; it is exported so external auditors
// can replay the same check over a stored settlement.
//
// ============================================================================

use serde::{Deserialize, Serialize};

/// Acceptable floating-point drift, cent-level. A tolerance, not a business
/// rule: a diff past it means a numeric bug, not an accepted rounding loss.
pub const CONSERVATION_EPSILON: f64 = 0.01;

/// Outcome of a conservation check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Σ amount over all bets
    pub total_pool: f64,
    /// Σ payout over all bets
    pub total_payout: f64,
    /// Fees plus payouts
    pub distributed: f64,
    /// total_pool - distributed (signed)
    pub diff: f64,
    /// |diff| < CONSERVATION_EPSILON
    pub ok: bool,
}

/// Check that fees plus payouts account for the whole pool
pub fn verify(
    total_pool: f64,
    platform_fee: f64,
    validator_fee: f64,
    creator_fee: f64,
    payouts: &[f64],
) -> ConservationReport {
    let total_payout: f64 = payouts.iter().sum();
    let distributed = platform_fee + validator_fee + creator_fee + total_payout;
    let diff = total_pool - distributed;

    ConservationReport {
        total_pool,
        total_payout,
        distributed,
        diff,
        ok: diff.abs() < CONSERVATION_EPSILON,
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
