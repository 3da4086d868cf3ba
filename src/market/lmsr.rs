// ============================================================================
// LMSR Pricing - Pulse Market Engine
// ============================================================================
//
// Logarithmic Market Scoring Rule over cumulative per-option stakes.
//
// Formula (price of option i, stakes q, liquidity b):
//   price_i = exp(q_i / b) / Σ_j exp(q_j / b)
//
// Cost function (treasury exposure):
//   C(q) = b * ln(Σ_j exp(q_j / b))
//
// Prices form a probability simplex: every entry in (0, 1), sum = 1.
// Smaller b ⇒ thinner liquidity ⇒ larger price move per unit stake.
//
// Numeric Stability:
//   Both evaluations subtract the maximum exponent argument before calling
//   exp. Naive exponentiation overflows f64 once q/b passes ~709, which
//   real stake/liquidity ratios reach easily. The shifted form is exact:
//   the common factor exp(max) cancels in the price quotient and is added
//   back through the log in the cost.
//
// ============================================================================

use serde::{Deserialize, Serialize};

/// Current price (implied probability) of each option.
///
/// Pure and read-only: callable at any point in a market's open lifetime,
/// any number of times.
pub fn lmsr_prices(stakes: &[f64], b: f64) -> Result<Vec<f64>, PricingError> {
    let max_arg = max_exponent_arg(stakes, b)?;

    let weights: Vec<f64> = stakes.iter().map(|&q| (q / b - max_arg).exp()).collect();
    let z: f64 = weights.iter().sum();

    Ok(weights.into_iter().map(|w| w / z).collect())
}

/// LMSR cost of the current stake state, `b * ln(Σ exp(q_i / b))`.
///
/// The price vector is the gradient of this function; tests cross-check the
/// two and the simulator reports it as treasury exposure.
pub fn lmsr_cost(stakes: &[f64], b: f64) -> Result<f64, PricingError> {
    let max_arg = max_exponent_arg(stakes, b)?;

    let z: f64 = stakes.iter().map(|&q| (q / b - max_arg).exp()).sum();
    Ok(b * (max_arg + z.ln()))
}

/// Shared validation plus the stability shift
fn max_exponent_arg(stakes: &[f64], b: f64) -> Result<f64, PricingError> {
    if stakes.is_empty() {
        return Err(PricingError::EmptyMarket);
    }
    if !(b > 0.0) || !b.is_finite() {
        return Err(PricingError::InvalidLiquidity(b));
    }

    Ok(stakes.iter().fold(f64::NEG_INFINITY, |m, &q| m.max(q / b)))
}

// ============================================================================
// ERRORS
// ============================================================================

/// Pricing-related errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PricingError {
    /// Liquidity parameter must be positive and finite
    InvalidLiquidity(f64),
    /// Stake sequence has zero options
    EmptyMarket,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::InvalidLiquidity(b) => write!(f, "invalid liquidity parameter: {}", b),
            PricingError::EmptyMarket => write!(f, "market has no options"),
        }
    }
}

impl std::error::Error for PricingError {}

// ============================================================================
// UNIT TESTS
// ============================================================================
