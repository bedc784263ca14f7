//! Error types for the feed pipeline.

use thiserror::Error;

/// Errors raised by the price buffer and its runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Buffer configuration is internally inconsistent.
    #[error("invalid buffer config: {0}")]
    InvalidConfig(String),
}

/// Convenience result alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
