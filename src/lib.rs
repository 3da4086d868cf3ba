/// Pulse Market Engine
/// Fee governance and LMSR market settlement for prediction pools.
/// Exports all modules for use as a library crate

pub mod accounts;
pub mod engine;
pub mod market;
pub mod registry;

// Re-export from registry (global fee governance)
pub use registry::{FeeConfig, FeeRegistry, FeeSnapshot, RegistryError, MAX_TOTAL_FEE_BPS};

// Re-export from market (pricing, lifecycle, settlement, conservation)
pub use market::{
    lmsr_cost, lmsr_prices, verify, Bet, BetOutcome, ConservationReport, Market, MarketError,
    MarketStatus, PricingError, SettlementError, SettlementResult, CONSERVATION_EPSILON,
};

// Re-export the instruction surface and test identities
pub use accounts::{deployer_address, AccountDirectory, AccountInfo, TestAccount};
pub use engine::MarketEngine;
