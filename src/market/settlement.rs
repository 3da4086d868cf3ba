// ============================================================================
// Settlement Engine - Pulse Market Engine
// ============================================================================
//
// Partitions a settled market's pool into platform fee, validator fee,
// creator fee, and a prize pool, then distributes the prize pool pro-rata
// among the bets on the winning option.
//
// The fee rates arrive as a single snapshot taken when settlement starts;
// no interim registry change can affect an in-flight settlement. Settlement
// uses pool shares, never the price quoted at bet time.
//
// Every result passes the conservation check before it is returned. A
// failed check aborts the settlement with the signed difference; it is
// never silently tolerated.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::conservation::{self, ConservationReport};
use super::markets::Bet;
use crate::registry::FeeSnapshot;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Per-bet line of a settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOutcome {
    pub bet_id: String,
    pub account: String,
    /// Option the bet was placed on
    pub outcome: usize,
    /// Original stake
    pub amount: f64,
    /// Share of the prize pool (0 for losers)
    pub payout: f64,
    /// payout - amount (losers: -amount)
    pub profit: f64,
    pub is_winner: bool,
}

/// The immutable result of one market resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub winning_outcome: usize,
    pub total_pool: f64,
    pub platform_fee: f64,
    pub validator_fee: f64,
    pub creator_fee: f64,
    /// Pool remaining for winners after fees
    pub prize_pool: f64,
    /// One line per bet, in bet order
    pub outcomes: Vec<BetOutcome>,
    /// The conservation check the result passed
    pub conservation: ConservationReport,
    pub settled_at: u64,
}

impl SettlementResult {
    /// Count of winning bets
    pub fn winner_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_winner).count()
    }

    /// Σ payout over all bets
    pub fn total_payout(&self) -> f64 {
        self.outcomes.iter().map(|o| o.payout).sum()
    }
}

// ============================================================================
// SETTLEMENT
// ============================================================================

/// One fee share of the pool, `total_pool * bps / 10_000`
pub fn fee_amount(total_pool: f64, bps: u16) -> f64 {
    total_pool * bps as f64 / 10_000.0
}

/// Distribute a final bet ledger for the given winning option.
///
/// Pure: the caller owns the lifecycle (closing the market to new bets,
/// storing the result). Fails `NoWinners` when no stake sits on the winning
/// option - the prize pool is not distributable and the fallback policy
/// (refund, treasury sweep) is a caller decision this engine does not make.
pub fn settle_bets(
    bets: &[Bet],
    winning_outcome: usize,
    fees: FeeSnapshot,
) -> Result<SettlementResult, SettlementError> {
    let total_pool: f64 = bets.iter().map(|b| b.amount).sum();

    let platform_fee = fee_amount(total_pool, fees.platform_fee_bps);
    let validator_fee = fee_amount(total_pool, fees.validator_fee_bps);
    let creator_fee = fee_amount(total_pool, fees.creator_fee_bps);
    let prize_pool = total_pool - platform_fee - validator_fee - creator_fee;

    let winners_stake: f64 = bets
        .iter()
        .filter(|b| b.outcome == winning_outcome)
        .map(|b| b.amount)
        .sum();

    if winners_stake == 0.0 {
        return Err(SettlementError::NoWinners);
    }

    let outcomes: Vec<BetOutcome> = bets
        .iter()
        .map(|bet| {
            let is_winner = bet.outcome == winning_outcome;
            let payout = if is_winner {
                bet.amount / winners_stake * prize_pool
            } else {
                0.0
            };
            BetOutcome {
                bet_id: bet.id.clone(),
                account: bet.account.clone(),
                outcome: bet.outcome,
                amount: bet.amount,
                payout,
                profit: payout - bet.amount,
                is_winner,
            }
        })
        .collect();

    let payouts: Vec<f64> = outcomes.iter().map(|o| o.payout).collect();
    let report = conservation::verify(total_pool, platform_fee, validator_fee, creator_fee, &payouts);
    if !report.ok {
        tracing::error!(diff = report.diff, "settlement failed conservation check");
        return Err(SettlementError::ConservationViolation { diff: report.diff });
    }

    tracing::info!(
        winning_outcome,
        total_pool,
        prize_pool,
        winners = outcomes.iter().filter(|o| o.is_winner).count(),
        "market settled"
    );

    Ok(SettlementResult {
        winning_outcome,
        total_pool,
        platform_fee,
        validator_fee,
        creator_fee,
        prize_pool,
        outcomes,
        conservation: report,
        settled_at: now(),
    })
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// ERRORS
// ============================================================================

/// Settlement-related errors. Both are fatal to the attempt: no partial
/// result is ever returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettlementError {
    /// No bet chose the winning option; caller must apply a fallback policy
    NoWinners,
    /// The result failed the conservation check; carries the signed diff
    ConservationViolation { diff: f64 },
}

impl std::fmt::Display for SettlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementError::NoWinners => write!(f, "no bets on the winning option"),
            SettlementError::ConservationViolation { diff } => {
                write!(f, "conservation violation: {} unaccounted for", diff)
            }
        }
    }
}

impl std::error::Error for SettlementError {}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bet(id: &str, account: &str, outcome: usize, amount: f64) -> Bet {
        Bet {
            id: id.to_string(),
            market_id: "mkt_test".to_string(),
            account: account.to_string(),
            outcome,
            amount,
            quoted_price: 0.5,
            placed_at: 0,
        }
    }

    fn fees(platform: u16, validator: u16, creator: u16) -> FeeSnapshot {
        FeeSnapshot {
            platform_fee_bps: platform,
            validator_fee_bps: validator,
            creator_fee_bps: creator,
        }
    }

    #[test]
    fn test_two_bet_reference_distribution() {
        // 60 on A, 40 on B, fees 5% / 5% / 0.1%, A wins:
        // 5 + 5 + 0.1 + 89.9 = 100
        let bets = vec![bet("b1", "ALICE", 0, 60.0), bet("b2", "BOB", 1, 40.0)];
        let result = settle_bets(&bets, 0, fees(500, 500, 10)).unwrap();

        assert!((result.platform_fee - 5.0).abs() < 1e-9);
        assert!((result.validator_fee - 5.0).abs() < 1e-9);
        assert!((result.creator_fee - 0.1).abs() < 1e-9);
        assert!((result.prize_pool - 89.9).abs() < 1e-9);

        let alice = &result.outcomes[0];
        assert!(alice.is_winner);
        assert!((alice.payout - 89.9).abs() < 1e-9);
        assert!((alice.profit - 29.9).abs() < 1e-9);

        let bob = &result.outcomes[1];
        assert!(!bob.is_winner);
        assert_eq!(bob.payout, 0.0);
        assert!((bob.profit + 40.0).abs() < 1e-9);

        assert!(result.conservation.ok);
    }

    #[test]
    fn test_pro_rata_among_winners() {
        let bets = vec![
            bet("b1", "ALICE", 0, 30.0),
            bet("b2", "BOB", 0, 10.0),
            bet("b3", "CAROL", 1, 60.0),
        ];
        let result = settle_bets(&bets, 0, fees(0, 0, 0)).unwrap();

        // No fees: prize pool is the whole 100, split 3:1
        assert!((result.outcomes[0].payout - 75.0).abs() < 1e-9);
        assert!((result.outcomes[1].payout - 25.0).abs() < 1e-9);
        assert_eq!(result.outcomes[2].payout, 0.0);
        assert!(result.conservation.ok);
    }

    #[test]
    fn test_no_winners_is_explicit() {
        let bets = vec![bet("b1", "ALICE", 0, 60.0), bet("b2", "BOB", 0, 40.0)];
        let result = settle_bets(&bets, 1, fees(500, 500, 10));

        assert_eq!(result, Err(SettlementError::NoWinners));
    }

    #[test]
    fn test_empty_ledger_has_no_winners() {
        let result = settle_bets(&[], 0, fees(500, 500, 10));

        assert_eq!(result, Err(SettlementError::NoWinners));
    }

    #[test]
    fn test_settlement_uses_shares_not_quoted_price() {
        let mut long_shot = bet("b1", "ALICE", 0, 50.0);
        long_shot.quoted_price = 0.01;
        let mut favorite = bet("b2", "BOB", 0, 50.0);
        favorite.quoted_price = 0.99;

        let result = settle_bets(&[long_shot, favorite], 0, fees(0, 0, 0)).unwrap();

        // Equal stakes, equal payouts, quoted price irrelevant
        assert!((result.outcomes[0].payout - result.outcomes[1].payout).abs() < 1e-12);
    }

    #[test]
    fn test_conservation_holds_across_many_bets() {
        let bets: Vec<Bet> = (0..500)
            .map(|i| bet(&format!("b{}", i), &format!("user_{}", i), i % 4, 10.0 + (i % 37) as f64))
            .collect();
        let result = settle_bets(&bets, 2, fees(2000, 3000, 4000)).unwrap();

        assert!(result.conservation.ok);
        let redistributed = result.platform_fee
            + result.validator_fee
            + result.creator_fee
            + result.total_payout();
        assert!((redistributed - result.total_pool).abs() < 0.01);
    }

    #[test]
    fn test_full_fee_cap_leaves_zero_prize() {
        let bets = vec![bet("b1", "ALICE", 0, 100.0)];
        let result = settle_bets(&bets, 0, fees(10_000, 0, 0)).unwrap();

        assert!((result.platform_fee - 100.0).abs() < 1e-9);
        assert!(result.prize_pool.abs() < 1e-9);
        assert!((result.outcomes[0].profit + 100.0).abs() < 1e-9);
        assert!(result.conservation.ok);
    }
}
