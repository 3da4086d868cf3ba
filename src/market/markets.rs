// ============================================================================
// Markets - Pulse Market Engine
// ============================================================================
//
// Market and bet records plus the market lifecycle state machine.
//
// Flow: Open → Settling → Settled
//
// A market accepts bets only while Open. Settlement entry flips the market
// to Settling atomically, so no bet can land in a ledger that is being
// distributed. Settling is left only by a successful settlement (→ Settled,
// terminal); a typed settlement failure (NoWinners, ConservationViolation)
// keeps the market in Settling for the caller to apply policy or retry.
// There is no path back to Open.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::lmsr::{self, PricingError};
use super::settlement::{self, SettlementError, SettlementResult};
use crate::registry::{FeeSnapshot, RegistryError};

// ============================================================================
// LIFECYCLE STATUS
// ============================================================================

/// Market lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Accepting bets, pricing available
    Open,
    /// Settlement in progress or awaiting caller policy; no further bets
    Settling,
    /// Settlement result stored; terminal
    Settled,
}

impl MarketStatus {
    /// Check if new bets are accepted in this status
    pub fn is_open(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }

    /// Check if the market has a final settlement
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Settled)
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            MarketStatus::Open => "open",
            MarketStatus::Settling => "settling",
            MarketStatus::Settled => "settled",
        };
        write!(f, "{}", status_str)
    }
}

impl Default for MarketStatus {
    fn default() -> Self {
        MarketStatus::Open
    }
}

// ============================================================================
// BET
// ============================================================================

/// A recorded bet. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    /// Unique bet ID (e.g., "bet_mkt1_9f2c...")
    pub id: String,

    /// Market that owns this bet
    pub market_id: String,

    /// Account that placed it
    pub account: String,

    /// Option index chosen
    pub outcome: usize,

    /// Amount staked (positive)
    pub amount: f64,

    /// LMSR price of the chosen option at the moment the bet was accepted,
    /// quoted before this stake was applied. Informational: settlement uses
    /// pool shares, not this price.
    pub quoted_price: f64,

    /// Unix timestamp of acceptance
    pub placed_at: u64,
}

// ============================================================================
// MARKET
// ============================================================================

/// A prediction market: fixed option set, cumulative stake accumulators,
/// LMSR liquidity parameter, bet ledger, and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Unique market identifier
    pub id: String,

    /// Market question/title
    pub title: String,

    /// Option labels, insertion order = option index, fixed for life
    pub outcomes: Vec<String>,

    /// Cumulative stake per option; starts at zero, only increases
    pub stakes: Vec<f64>,

    /// LMSR liquidity parameter `b`, fixed at creation
    pub liquidity_b: f64,

    /// Lifecycle status
    pub status: MarketStatus,

    /// All accepted bets, in acceptance order
    pub bets: Vec<Bet>,

    /// Creation timestamp
    pub created_at: u64,

    /// Settlement timestamp (if settled)
    pub settled_at: Option<u64>,

    /// The settlement result (if settled)
    pub settlement: Option<SettlementResult>,
}

impl Market {
    /// Create a new open market
    pub fn new(
        id: String,
        title: String,
        outcomes: Vec<String>,
        liquidity_b: f64,
    ) -> Result<Self, MarketError> {
        if outcomes.len() < 2 {
            return Err(MarketError::Pricing(PricingError::EmptyMarket));
        }
        if !(liquidity_b > 0.0) || !liquidity_b.is_finite() {
            return Err(MarketError::Pricing(PricingError::InvalidLiquidity(liquidity_b)));
        }

        let option_count = outcomes.len();
        Ok(Self {
            id,
            title,
            outcomes,
            stakes: vec![0.0; option_count],
            liquidity_b,
            status: MarketStatus::Open,
            bets: Vec::new(),
            created_at: now(),
            settled_at: None,
            settlement: None,
        })
    }

    /// Current LMSR price of each option
    pub fn prices(&self) -> Result<Vec<f64>, MarketError> {
        Ok(lmsr::lmsr_prices(&self.stakes, self.liquidity_b)?)
    }

    /// Σ amount over all accepted bets
    pub fn total_pool(&self) -> f64 {
        self.bets.iter().map(|b| b.amount).sum()
    }

    /// Accept a bet: quote the pre-bet price, apply the stake, record it.
    pub fn place_bet(
        &mut self,
        account: &str,
        outcome: usize,
        amount: f64,
    ) -> Result<Bet, MarketError> {
        if !self.status.is_open() {
            return Err(MarketError::BettingClosed(self.id.clone()));
        }
        if outcome >= self.outcomes.len() {
            return Err(MarketError::InvalidOutcome(outcome));
        }
        if !(amount > 0.0) || !amount.is_finite() {
            return Err(MarketError::InvalidAmount(amount));
        }

        // Quote before the stake moves the curve
        let quoted_price = lmsr::lmsr_prices(&self.stakes, self.liquidity_b)?[outcome];
        self.stakes[outcome] += amount;

        let bet = Bet {
            id: format!("bet_{}_{}", self.id, Uuid::new_v4().simple()),
            market_id: self.id.clone(),
            account: account.to_string(),
            outcome,
            amount,
            quoted_price,
            placed_at: now(),
        };
        self.bets.push(bet.clone());

        tracing::debug!(
            market = %self.id,
            account,
            outcome,
            amount,
            quoted_price,
            "bet accepted"
        );
        Ok(bet)
    }

    /// Settle the market for the given winning option.
    ///
    /// Closes betting atomically on entry, runs the settlement engine over
    /// the final ledger with the supplied fee snapshot, and stores the
    /// result. Re-invoking after success fails `AlreadySettled` and leaves
    /// the stored result untouched.
    pub fn settle(
        &mut self,
        winning_outcome: usize,
        fees: FeeSnapshot,
    ) -> Result<SettlementResult, MarketError> {
        if self.status.is_terminal() {
            return Err(MarketError::AlreadySettled(self.id.clone()));
        }
        if winning_outcome >= self.outcomes.len() {
            return Err(MarketError::InvalidOutcome(winning_outcome));
        }

        // From here on no new bets, even if settlement fails
        self.status = MarketStatus::Settling;

        let result = settlement::settle_bets(&self.bets, winning_outcome, fees)?;
        self.settled_at = Some(result.settled_at);
        self.settlement = Some(result.clone());
        self.status = MarketStatus::Settled;

        Ok(result)
    }

    /// All bets placed by one account
    pub fn bets_for_account(&self, account: &str) -> Vec<Bet> {
        self.bets
            .iter()
            .filter(|b| b.account == account)
            .cloned()
            .collect()
    }
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

/// Market-related errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketError {
    /// Bet arrived while not Open; carries the market id
    BettingClosed(String),
    /// Option index outside the market's option set
    InvalidOutcome(usize),
    /// Non-positive or non-finite stake
    InvalidAmount(f64),
    /// Settlement re-invoked on a Settled market
    AlreadySettled(String),
    /// Unknown market id
    MarketNotFound(String),
    /// Market id already taken
    MarketExists(String),
    Pricing(PricingError),
    Settlement(SettlementError),
    Registry(RegistryError),
}

impl From<PricingError> for MarketError {
    fn from(err: PricingError) -> Self {
        MarketError::Pricing(err)
    }
}

impl From<SettlementError> for MarketError {
    fn from(err: SettlementError) -> Self {
        MarketError::Settlement(err)
    }
}

impl From<RegistryError> for MarketError {
    fn from(err: RegistryError) -> Self {
        MarketError::Registry(err)
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::BettingClosed(id) => write!(f, "market {} is not accepting bets", id),
            MarketError::InvalidOutcome(idx) => write!(f, "invalid outcome index: {}", idx),
            MarketError::InvalidAmount(amt) => write!(f, "invalid bet amount: {}", amt),
            MarketError::AlreadySettled(id) => write!(f, "market {} already settled", id),
            MarketError::MarketNotFound(id) => write!(f, "market not found: {}", id),
            MarketError::MarketExists(id) => write!(f, "market {} already exists", id),
            MarketError::Pricing(err) => write!(f, "pricing: {}", err),
            MarketError::Settlement(err) => write!(f, "settlement: {}", err),
            MarketError::Registry(err) => write!(f, "registry: {}", err),
        }
    }
}

impl std::error::Error for MarketError {}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_market() -> Market {
        Market::new(
            "mkt_1".to_string(),
            "Which option wins?".to_string(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            100.0,
        )
        .unwrap()
    }

    fn flat_fees() -> FeeSnapshot {
        FeeSnapshot {
            platform_fee_bps: 500,
            validator_fee_bps: 500,
            creator_fee_bps: 10,
        }
    }

    #[test]
    fn test_new_market_starts_open_and_zeroed() {
        let market = test_market();

        assert_eq!(market.status, MarketStatus::Open);
        assert_eq!(market.stakes, vec![0.0, 0.0, 0.0]);
        assert!(market.bets.is_empty());
        assert_eq!(market.total_pool(), 0.0);
    }

    #[test]
    fn test_market_needs_two_outcomes() {
        let result = Market::new(
            "mkt_1".to_string(),
            "degenerate".to_string(),
            vec!["only".to_string()],
            100.0,
        );
        assert!(matches!(result, Err(MarketError::Pricing(PricingError::EmptyMarket))));
    }

    #[test]
    fn test_market_needs_positive_liquidity() {
        let result = Market::new(
            "mkt_1".to_string(),
            "bad b".to_string(),
            vec!["A".to_string(), "B".to_string()],
            0.0,
        );
        assert!(matches!(
            result,
            Err(MarketError::Pricing(PricingError::InvalidLiquidity(_)))
        ));
    }

    #[test]
    fn test_bet_quotes_pre_bet_price() {
        let mut market = test_market();
        let bet = market.place_bet("ALICE", 0, 50.0).unwrap();

        // First bet on an empty 3-way market: quoted at 1/3
        assert!((bet.quoted_price - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(market.stakes[0], 50.0);

        // Second bet on the same option sees the moved price
        let second = market.place_bet("BOB", 0, 50.0).unwrap();
        assert!(second.quoted_price > bet.quoted_price);
    }

    #[test]
    fn test_bet_validation() {
        let mut market = test_market();

        assert!(matches!(
            market.place_bet("ALICE", 7, 10.0),
            Err(MarketError::InvalidOutcome(7))
        ));
        assert!(matches!(
            market.place_bet("ALICE", 0, 0.0),
            Err(MarketError::InvalidAmount(_))
        ));
        assert!(matches!(
            market.place_bet("ALICE", 0, -5.0),
            Err(MarketError::InvalidAmount(_))
        ));
        assert!(matches!(
            market.place_bet("ALICE", 0, f64::NAN),
            Err(MarketError::InvalidAmount(_))
        ));
        assert!(market.bets.is_empty());
        assert_eq!(market.stakes, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_settle_closes_betting() {
        let mut market = test_market();
        market.place_bet("ALICE", 0, 60.0).unwrap();
        market.place_bet("BOB", 1, 40.0).unwrap();

        let result = market.settle(0, flat_fees()).unwrap();
        assert_eq!(market.status, MarketStatus::Settled);
        assert!((result.prize_pool - 89.9).abs() < 1e-9);

        assert!(matches!(
            market.place_bet("CAROL", 2, 10.0),
            Err(MarketError::BettingClosed(_))
        ));
    }

    #[test]
    fn test_no_double_settlement() {
        let mut market = test_market();
        market.place_bet("ALICE", 0, 60.0).unwrap();

        let first = market.settle(0, flat_fees()).unwrap();
        let second = market.settle(1, flat_fees());

        assert!(matches!(second, Err(MarketError::AlreadySettled(_))));
        // The stored result is the first one, unchanged
        assert_eq!(market.settlement.as_ref(), Some(&first));
    }

    #[test]
    fn test_failed_settlement_stays_settling() {
        let mut market = test_market();
        market.place_bet("ALICE", 0, 60.0).unwrap();

        // Nobody on option 1
        let result = market.settle(1, flat_fees());
        assert!(matches!(
            result,
            Err(MarketError::Settlement(SettlementError::NoWinners))
        ));
        assert_eq!(market.status, MarketStatus::Settling);
        assert!(market.settlement.is_none());

        // No bets land after the failed attempt either
        assert!(matches!(
            market.place_bet("BOB", 1, 10.0),
            Err(MarketError::BettingClosed(_))
        ));

        // Retry with a backed option succeeds
        let retried = market.settle(0, flat_fees()).unwrap();
        assert_eq!(market.status, MarketStatus::Settled);
        assert!(retried.conservation.ok);
    }

    #[test]
    fn test_settle_rejects_bad_outcome_index() {
        let mut market = test_market();
        market.place_bet("ALICE", 0, 60.0).unwrap();

        assert!(matches!(
            market.settle(9, flat_fees()),
            Err(MarketError::InvalidOutcome(9))
        ));
        // Range check happens before the lifecycle transition
        assert_eq!(market.status, MarketStatus::Open);
    }

    #[test]
    fn test_bets_for_account() {
        let mut market = test_market();
        market.place_bet("ALICE", 0, 10.0).unwrap();
        market.place_bet("BOB", 1, 20.0).unwrap();
        market.place_bet("ALICE", 2, 30.0).unwrap();

        let alice_bets = market.bets_for_account("ALICE");
        assert_eq!(alice_bets.len(), 2);
        assert!(alice_bets.iter().all(|b| b.account == "ALICE"));
    }
}
