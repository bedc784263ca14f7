//! Owner key loading.
//!
//! Security notes:
//! - Private keys are stored in `PrivateKeySigner`, which handles secure
//!   memory.
//! - Keys are loaded once at startup; no runtime key rotation.
//! - Never log private key material.

use std::path::PathBuf;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::error::KeyError;

/// Source of the owner private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

/// Holds the trader's owner key.
///
/// The owner key authorizes session-key delegations and signs orders
/// directly when no session key is active.
pub struct KeyManager {
    owner_signer: PrivateKeySigner,
    owner_address: Address,
}

impl KeyManager {
    /// Load the owner key from the specified source and verify its address.
    ///
    /// # Errors
    /// Returns `KeyError` if:
    /// - Environment variable not found
    /// - File read fails
    /// - Hex decoding fails
    /// - Private key is invalid
    /// - Derived address does not match `expected_address`
    pub fn load(source: KeySource, expected_address: Option<Address>) -> Result<Self, KeyError> {
        // Parse hex key from string (supports 0x prefix and whitespace).
        fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
            let trimmed = hex_str.trim().trim_start_matches("0x");
            Ok(Zeroizing::new(hex::decode(trimmed)?))
        }

        let secret_bytes: Zeroizing<Vec<u8>> = match source {
            KeySource::EnvVar { ref var_name } => {
                let hex = std::env::var(var_name)
                    .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?;
                parse_hex_key(&hex)?
            }
            KeySource::File { ref path } => {
                let content = std::fs::read_to_string(path)?;
                parse_hex_key(&content)?
            }
        };

        Self::from_bytes(&secret_bytes, expected_address)
    }

    /// Load from raw bytes, verifying the derived address when expected.
    ///
    /// # Errors
    /// Returns `KeyError::InvalidKey` or `KeyError::AddressMismatch`.
    pub fn from_bytes(
        secret_bytes: &[u8],
        expected_address: Option<Address>,
    ) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self {
            owner_address: signer.address(),
            owner_signer: signer,
        })
    }

    /// The owner signer.
    pub fn owner_signer(&self) -> &PrivateKeySigner {
        &self.owner_signer
    }

    /// The owner address.
    pub fn owner_address(&self) -> Address {
        self.owner_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (DO NOT use in production).
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_key_bytes() -> Vec<u8> {
        hex::decode(TEST_PRIVATE_KEY.trim_start_matches("0x")).unwrap()
    }

    #[test]
    fn test_key_manager_from_bytes() {
        let manager = KeyManager::from_bytes(&test_key_bytes(), None).unwrap();
        assert_ne!(manager.owner_address(), Address::ZERO);
        assert_eq!(manager.owner_signer().address(), manager.owner_address());
    }

    #[test]
    fn test_key_manager_address_mismatch() {
        let result = KeyManager::from_bytes(&test_key_bytes(), Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_key_manager_rejects_garbage() {
        let result = KeyManager::from_bytes(&[0u8; 3], None);
        assert!(matches!(result, Err(KeyError::InvalidKey(_))));
    }
}
