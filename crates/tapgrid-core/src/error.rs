//! Error types for core domain operations.

use thiserror::Error;

/// Errors raised while constructing or validating core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Grid step must be strictly positive.
    #[error("invalid grid step: {0}")]
    InvalidGridStep(String),

    /// Anchor price must be strictly positive for percent-based steps.
    #[error("invalid anchor price: {0}")]
    InvalidAnchorPrice(String),

    /// Order status transition not permitted by the lifecycle machine.
    #[error("illegal order transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
