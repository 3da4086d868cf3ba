// ============================================================================
// Instruction Surface - Pulse Market Engine
// ============================================================================
//
// The caller-facing surface over owned shared state. One engine per
// deployment, holding the fee registry and every market behind their own
// locks:
//
//   - registry mutations (initialize_global, set_global_fees) serialize on
//     the registry lock;
//   - bet acceptance and settlement serialize on the individual market's
//     lock, so operations on unrelated markets proceed fully in parallel;
//   - no lock is held across another resource's mutation. settle_market
//     snapshots the fee rates under the registry lock, releases it, then
//     settles under the market lock alone.
//
// Every mutating operation is atomic relative to readers: the inner types
// validate before writing, and no reader can observe a partial update.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::market::lmsr;
use crate::market::markets::{Bet, Market, MarketError, MarketStatus};
use crate::market::settlement::SettlementResult;
use crate::market::PricingError;
use crate::registry::{FeeConfig, FeeRegistry, RegistryError};

/// The deployment-scoped engine handle. Cheap to share behind an `Arc`.
pub struct MarketEngine {
    registry: Mutex<FeeRegistry>,
    markets: Mutex<HashMap<String, Arc<Mutex<Market>>>>,
}

impl MarketEngine {
    /// Create an engine whose registry recognizes `deployer` as the
    /// principal allowed to run initialization.
    pub fn new(deployer: &str) -> Self {
        Self {
            registry: Mutex::new(FeeRegistry::new(deployer)),
            markets: Mutex::new(HashMap::new()),
        }
    }

    // ========================================================================
    // ADMIN PATH
    // ========================================================================

    /// Initialize the global fee config (deployer only, once)
    pub fn initialize_global(&self, caller: &str) -> Result<FeeConfig, RegistryError> {
        self.registry.lock().unwrap().initialize(caller)
    }

    /// Replace all three fee rates (authority only)
    pub fn set_global_fees(
        &self,
        caller: &str,
        platform_bps: u16,
        validator_bps: u16,
        creator_bps: u16,
    ) -> Result<FeeConfig, RegistryError> {
        self.registry
            .lock()
            .unwrap()
            .set_fees(caller, platform_bps, validator_bps, creator_bps)
    }

    /// Read-only snapshot of the global fee config
    pub fn global_fees(&self) -> Result<FeeConfig, RegistryError> {
        self.registry.lock().unwrap().get()
    }

    // ========================================================================
    // PRICING PATH
    // ========================================================================

    /// Stateless LMSR quote over an arbitrary stake vector
    pub fn quote_price(stakes: &[f64], b: f64) -> Result<Vec<f64>, PricingError> {
        lmsr::lmsr_prices(stakes, b)
    }

    /// Current prices of a recorded market
    pub fn market_prices(&self, market_id: &str) -> Result<Vec<f64>, MarketError> {
        let market = self.market_handle(market_id)?;
        let prices = market.lock().unwrap().prices()?;
        Ok(prices)
    }

    // ========================================================================
    // MARKET PATH
    // ========================================================================

    /// Create a new open market
    pub fn create_market(
        &self,
        id: &str,
        title: &str,
        outcomes: Vec<String>,
        liquidity_b: f64,
    ) -> Result<Market, MarketError> {
        let market = Market::new(id.to_string(), title.to_string(), outcomes, liquidity_b)?;

        let mut markets = self.markets.lock().unwrap();
        if markets.contains_key(id) {
            return Err(MarketError::MarketExists(id.to_string()));
        }
        markets.insert(id.to_string(), Arc::new(Mutex::new(market.clone())));

        tracing::info!(market = id, options = market.outcomes.len(), "market created");
        Ok(market)
    }

    /// Snapshot of a recorded market
    pub fn market(&self, market_id: &str) -> Result<Market, MarketError> {
        let market = self.market_handle(market_id)?;
        let snapshot = market.lock().unwrap().clone();
        Ok(snapshot)
    }

    /// Ids of all recorded markets
    pub fn market_ids(&self) -> Vec<String> {
        self.markets.lock().unwrap().keys().cloned().collect()
    }

    /// Ids of markets still accepting bets
    pub fn open_market_ids(&self) -> Vec<String> {
        self.markets
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.lock().unwrap().status == MarketStatus::Open)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Accept a bet on a market
    pub fn place_bet(
        &self,
        market_id: &str,
        account: &str,
        outcome: usize,
        amount: f64,
    ) -> Result<Bet, MarketError> {
        let market = self.market_handle(market_id)?;
        let bet = market.lock().unwrap().place_bet(account, outcome, amount)?;
        Ok(bet)
    }

    /// Settle a market against the registry's current rates.
    ///
    /// The fee snapshot is taken exactly once, before the market lock is
    /// acquired; a concurrent `set_global_fees` lands either wholly before
    /// or wholly after this settlement.
    pub fn settle_market(
        &self,
        market_id: &str,
        winning_outcome: usize,
    ) -> Result<SettlementResult, MarketError> {
        let market = self.market_handle(market_id)?;
        let fees = self.registry.lock().unwrap().snapshot()?;
        let result = market.lock().unwrap().settle(winning_outcome, fees)?;
        Ok(result)
    }

    /// Fetch the per-market lock, holding the map lock only for the lookup
    fn market_handle(&self, market_id: &str) -> Result<Arc<Mutex<Market>>, MarketError> {
        self.markets
            .lock()
            .unwrap()
            .get(market_id)
            .cloned()
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
