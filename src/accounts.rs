// ============================================================================
// Test Identities - Pulse Market Engine
// ============================================================================
//
// Deterministic Ed25519 accounts for the simulator and integration tests.
//
// The engine itself treats identities as opaque strings; what it needs from
// the surrounding system is one pre-established deployer principal that is
// allowed to initialize the fee registry. Deriving every account from a
// master seed keeps that principal (and the bettor addresses) stable across
// runs, the same way the deployer key is pinned in a deployment config.
//
// NEVER use the master seed in production.
//
// ============================================================================

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Master seed for deterministic key generation (test-only)
pub const MASTER_SEED: &[u8; 32] = b"PULSE_MARKET_TEST_MASTER_SEED_01";

/// Well-known account names.
/// DEPLOYER is the principal permitted to initialize the fee registry;
/// ORACLE resolves markets; ALICE and BOB are bettors.
pub const TEST_ACCOUNT_NAMES: [&str; 4] = ["DEPLOYER", "ORACLE", "ALICE", "BOB"];

// ============================================================================
// TEST ACCOUNT
// ============================================================================

/// A test account with a deterministic Ed25519 keypair
#[derive(Clone)]
pub struct TestAccount {
    pub name: String,
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    pub address: String,
}

impl TestAccount {
    /// Derive an account from a seed and name: SHA256(seed || name)
    pub fn from_seed(seed: &[u8; 32], name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(name.as_bytes());
        let derived_key: [u8; 32] = hasher.finalize().into();

        let signing_key = SigningKey::from_bytes(&derived_key);
        let verifying_key = signing_key.verifying_key();

        // Address is the hex-encoded public key with a PX_ prefix
        let address = format!("PX_{}", hex::encode(verifying_key.as_bytes()).to_uppercase());

        TestAccount {
            name: name.to_string(),
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Sign a message with this account's private key
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign a message and return a hex-encoded signature
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message).to_bytes())
    }

    /// Verify a signature against this account's public key
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key.verify(message, signature).is_ok()
    }

    /// Verify a hex-encoded signature
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        match hex::decode(signature_hex) {
            Ok(sig_bytes) => {
                if sig_bytes.len() != 64 {
                    return false;
                }
                let mut sig_array = [0u8; 64];
                sig_array.copy_from_slice(&sig_bytes);
                self.verify(message, &Signature::from_bytes(&sig_array))
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for TestAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestAccount")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// Serializable account info (keys stay private)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub address: String,
    pub public_key_hex: String,
}

impl From<&TestAccount> for AccountInfo {
    fn from(account: &TestAccount) -> Self {
        AccountInfo {
            name: account.name.clone(),
            address: account.address.clone(),
            public_key_hex: hex::encode(account.verifying_key.as_bytes()),
        }
    }
}

// ============================================================================
// DIRECTORY
// ============================================================================

/// All well-known test accounts, with address reverse lookup
pub struct AccountDirectory {
    pub accounts: HashMap<String, TestAccount>,
    pub address_to_name: HashMap<String, String>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        let mut accounts = HashMap::new();
        let mut address_to_name = HashMap::new();

        for name in TEST_ACCOUNT_NAMES.iter() {
            let account = TestAccount::from_seed(MASTER_SEED, name);
            address_to_name.insert(account.address.clone(), name.to_string());
            accounts.insert(name.to_string(), account);
        }

        AccountDirectory {
            accounts,
            address_to_name,
        }
    }

    /// Look up an account by name
    pub fn get(&self, name: &str) -> Option<&TestAccount> {
        self.accounts.get(name)
    }

    /// The deployer principal
    pub fn deployer(&self) -> &TestAccount {
        // DEPLOYER is in TEST_ACCOUNT_NAMES, so the entry always exists
        &self.accounts["DEPLOYER"]
    }

    /// Reverse-lookup a name from an address
    pub fn name_for_address(&self, address: &str) -> Option<&str> {
        self.address_to_name.get(address).map(String::as_str)
    }
}

impl Default for AccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// The pinned deployer address, derivable without a directory
pub fn deployer_address() -> String {
    TestAccount::from_seed(MASTER_SEED, "DEPLOYER").address
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_are_deterministic() {
        let a = TestAccount::from_seed(MASTER_SEED, "ALICE");
        let b = TestAccount::from_seed(MASTER_SEED, "ALICE");

        assert_eq!(a.address, b.address);
        assert_eq!(a.verifying_key, b.verifying_key);
    }

    #[test]
    fn test_distinct_names_distinct_keys() {
        let alice = TestAccount::from_seed(MASTER_SEED, "ALICE");
        let bob = TestAccount::from_seed(MASTER_SEED, "BOB");

        assert_ne!(alice.address, bob.address);
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let alice = TestAccount::from_seed(MASTER_SEED, "ALICE");
        let msg = b"bet:mkt_1:0:50";

        let sig_hex = alice.sign_hex(msg);
        assert!(alice.verify_hex(msg, &sig_hex));
        assert!(!alice.verify_hex(b"bet:mkt_1:0:51", &sig_hex));
        assert!(!alice.verify_hex(msg, "deadbeef"));
    }

    #[test]
    fn test_directory_lookup() {
        let directory = AccountDirectory::new();

        let deployer = directory.deployer();
        assert_eq!(deployer.name, "DEPLOYER");
        assert_eq!(deployer.address, deployer_address());

        let alice = directory.get("ALICE").unwrap();
        assert_eq!(directory.name_for_address(&alice.address), Some("ALICE"));
        assert_eq!(directory.name_for_address("PX_NOBODY"), None);
    }
}
