// ============================================================================
// Fee Registry - Pulse Market Engine
// ============================================================================
//
// Single authoritative record of the platform fee rates, in basis points.
//
// Lifecycle:
//   - One registry slot exists per deployment, created uninitialized.
//   - `initialize` may only be run by the recognized deployer principal and
//     creates the config with all rates at zero.
//   - `set_fees` may only be run by the stored authority, replaces all three
//     rates atomically, and enforces the 10_000 bps cap (inclusive).
//
// Rate Convention:
//   - 1 bps = 1/10000. A rate of 2000 bps = 20%.
//   - platform + validator + creator must never exceed 10_000 (100%).
//
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Hard cap on the combined fee rates (100%). Sums equal to the cap are
/// valid; sums above it are rejected.
pub const MAX_TOTAL_FEE_BPS: u32 = 10_000;

// ============================================================================
// FEE CONFIG
// ============================================================================

/// The initialized fee configuration: who may change the rates, and the
/// three rates themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// The sole identity permitted to mutate the fee rates
    pub authority: String,

    /// Platform share of the settled pool, in basis points
    pub platform_fee_bps: u16,

    /// Validator share of the settled pool, in basis points
    pub validator_fee_bps: u16,

    /// Market-creator share of the settled pool, in basis points
    pub creator_fee_bps: u16,
}

impl FeeConfig {
    /// Combined rate across all three fees
    pub fn total_bps(&self) -> u32 {
        total_bps(
            self.platform_fee_bps,
            self.validator_fee_bps,
            self.creator_fee_bps,
        )
    }

    /// Copyable rate triple for settlement. Taken once at settlement start
    /// so an in-flight settlement cannot observe a rate change.
    pub fn snapshot(&self) -> FeeSnapshot {
        FeeSnapshot {
            platform_fee_bps: self.platform_fee_bps,
            validator_fee_bps: self.validator_fee_bps,
            creator_fee_bps: self.creator_fee_bps,
        }
    }
}

/// Point-in-time copy of the fee rates used by a single settlement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeSnapshot {
    pub platform_fee_bps: u16,
    pub validator_fee_bps: u16,
    pub creator_fee_bps: u16,
}

/// Sum three bps rates without u16 overflow
fn total_bps(platform: u16, validator: u16, creator: u16) -> u32 {
    platform as u32 + validator as u32 + creator as u32
}

// ============================================================================
// REGISTRY SLOT
// ============================================================================

/// The deployment-scoped registry slot.
///
/// Modeled as an explicitly owned value rather than a process global:
/// callers hold (and pass) the handle, and the `uninitialized → initialized`
/// lifecycle is tracked by the inner `Option`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRegistry {
    /// Principal recognized as allowed to run initialization
    deployer: String,

    /// `None` until `initialize` succeeds
    config: Option<FeeConfig>,
}

impl FeeRegistry {
    /// Create the uninitialized slot for a deployment
    pub fn new(deployer: &str) -> Self {
        Self {
            deployer: deployer.to_string(),
            config: None,
        }
    }

    /// Whether `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Create the config with all rates at zero.
    ///
    /// Only the deployer principal may initialize; the caller becomes the
    /// authority for all future rate changes.
    pub fn initialize(&mut self, caller: &str) -> Result<FeeConfig, RegistryError> {
        if caller != self.deployer {
            return Err(RegistryError::Unauthorized);
        }
        if self.config.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }

        let config = FeeConfig {
            authority: caller.to_string(),
            platform_fee_bps: 0,
            validator_fee_bps: 0,
            creator_fee_bps: 0,
        };
        self.config = Some(config.clone());

        tracing::info!(authority = %caller, "fee registry initialized");
        Ok(config)
    }

    /// Replace all three fee rates.
    ///
    /// Validation happens before any field is written, so either all three
    /// rates change or none do.
    pub fn set_fees(
        &mut self,
        caller: &str,
        platform_bps: u16,
        validator_bps: u16,
        creator_bps: u16,
    ) -> Result<FeeConfig, RegistryError> {
        let config = self
            .config
            .as_mut()
            .ok_or(RegistryError::NotInitialized)?;

        if caller != config.authority {
            return Err(RegistryError::Unauthorized);
        }

        let total = total_bps(platform_bps, validator_bps, creator_bps);
        if total > MAX_TOTAL_FEE_BPS {
            return Err(RegistryError::InvalidFees(total));
        }

        config.platform_fee_bps = platform_bps;
        config.validator_fee_bps = validator_bps;
        config.creator_fee_bps = creator_bps;

        tracing::info!(
            platform_bps,
            validator_bps,
            creator_bps,
            "fee rates updated"
        );
        Ok(config.clone())
    }

    /// Read-only snapshot of the current config
    pub fn get(&self) -> Result<FeeConfig, RegistryError> {
        self.config.clone().ok_or(RegistryError::NotInitialized)
    }

    /// Rate triple for a settlement run
    pub fn snapshot(&self) -> Result<FeeSnapshot, RegistryError> {
        self.config
            .as_ref()
            .map(FeeConfig::snapshot)
            .ok_or(RegistryError::NotInitialized)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Registry-related errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryError {
    /// Caller identity does not match the deployer (initialize) or the
    /// stored authority (set_fees)
    Unauthorized,
    /// The slot already holds a config
    AlreadyInitialized,
    /// Read or update attempted before `initialize`
    NotInitialized,
    /// Proposed rates sum past the cap; carries the offending total
    InvalidFees(u32),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Unauthorized => write!(f, "unauthorized"),
            RegistryError::AlreadyInitialized => write!(f, "registry already initialized"),
            RegistryError::NotInitialized => write!(f, "registry not initialized"),
            RegistryError::InvalidFees(total) => {
                write!(f, "invalid fees: total {} bps exceeds {}", total, MAX_TOTAL_FEE_BPS)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

// ============================================================================
// UNIT TESTS
// ============================================================================
