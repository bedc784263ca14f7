//! Canonical order payload and hashing.
//!
//! The payload is serialized with msgpack in declaration order and
//! keccak-hashed; client and relayer must produce identical bytes, so
//! field order and wire names are part of the settlement contract.

use alloy::primitives::{keccak256, Address, B256};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::ExecutorError;

/// Contract identifier bound into every payload, versioning the
/// settlement program the signature is valid for.
pub const CONTRACT_IDENTIFIER: &str = "tapgrid.settlement.v1";

/// Canonical order payload.
///
/// Decimal fields are serialized as strings so both sides hash the same
/// text regardless of their numeric representation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPayload {
    /// Trader address, lowercase hex.
    trader: String,
    /// Market symbol.
    symbol: String,
    /// Direction.
    #[serde(rename = "isLong")]
    is_long: bool,
    /// Collateral as a decimal string.
    collateral: String,
    /// Leverage multiplier.
    leverage: u32,
    /// Per-trader replay-protection nonce.
    nonce: u64,
    /// Settlement contract identifier.
    contract: String,
}

impl OrderPayload {
    /// Build a canonical payload.
    #[must_use]
    pub fn new(
        trader: Address,
        symbol: &str,
        is_long: bool,
        collateral: Decimal,
        leverage: u32,
        nonce: u64,
    ) -> Self {
        Self {
            trader: format!("{trader:#x}"),
            symbol: symbol.to_string(),
            is_long,
            collateral: collateral.to_string(),
            leverage,
            nonce,
            contract: CONTRACT_IDENTIFIER.to_string(),
        }
    }

    /// The nonce embedded in this payload.
    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Canonical hash: `keccak256(msgpack_named(payload))`.
    ///
    /// # Errors
    /// Returns `ExecutorError::SerializationFailed` if msgpack
    /// serialization fails.
    pub fn hash(&self) -> Result<B256, ExecutorError> {
        let bytes = rmp_serde::to_vec_named(self)
            .map_err(|e| ExecutorError::SerializationFailed(e.to_string()))?;
        Ok(keccak256(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload(nonce: u64) -> OrderPayload {
        OrderPayload::new(Address::ZERO, "BTC-USD", true, dec!(25), 10, nonce)
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(payload(5).hash().unwrap(), payload(5).hash().unwrap());
    }

    #[test]
    fn test_nonce_changes_hash() {
        assert_ne!(payload(5).hash().unwrap(), payload(6).hash().unwrap());
    }

    #[test]
    fn test_direction_changes_hash() {
        let long = OrderPayload::new(Address::ZERO, "BTC-USD", true, dec!(25), 10, 5);
        let short = OrderPayload::new(Address::ZERO, "BTC-USD", false, dec!(25), 10, 5);
        assert_ne!(long.hash().unwrap(), short.hash().unwrap());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_string(&payload(5)).unwrap();
        assert!(json.contains("\"isLong\""));
        assert!(json.contains("\"contract\":\"tapgrid.settlement.v1\""));
        // Collateral travels as a string.
        assert!(json.contains("\"collateral\":\"25\""));
    }
}
