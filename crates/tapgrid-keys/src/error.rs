//! Error types for key loading and session key delegation.

use alloy::primitives::Address;
use thiserror::Error;

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session key delegation errors.
#[derive(Debug, Error)]
pub enum SessionKeyError {
    /// The owner declined to sign the delegation (or an order prompt).
    #[error("owner rejected the signing request")]
    SigningRejected,

    /// Signing failed for a reason other than rejection.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Post-creation self-check recovered a different address than the
    /// owner. Creation is aborted; the key is never marked usable.
    #[error("delegation self-check failed: expected {expected}, recovered {recovered}")]
    SelfCheckFailed {
        expected: Address,
        recovered: Address,
    },

    /// The delegation bundle names a different trader than claimed.
    #[error("delegation bound to {bound}, order claims {claimed}")]
    TraderMismatch { bound: Address, claimed: Address },

    /// The session key is past its expiry.
    #[error("session key expired at {expires_at_ms}ms")]
    Expired { expires_at_ms: u64 },

    /// Canonical serialization of the delegation message failed.
    #[error("delegation serialization failed: {0}")]
    SerializationFailed(String),

    /// Signature recovery failed (malformed signature bytes).
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),
}
