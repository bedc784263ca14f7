//! Error types for order execution.

use thiserror::Error;

use crate::relayer::RelayerError;
use tapgrid_grid::GridError;
use tapgrid_keys::SessionKeyError;

/// Errors raised while creating or repairing orders.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Tap rejected locally (unplayable column, degenerate geometry).
    /// No network call is made.
    #[error("tap validation failed: {0}")]
    Validation(#[from] GridError),

    /// The owner declined to sign; the order is never created.
    #[error("signing rejected")]
    SigningRejected,

    /// Signing failed for a reason other than rejection.
    #[error("signing failed: {0}")]
    Signing(SessionKeyError),

    /// The relayer could not be reached; a submitted order stays
    /// PENDING and is surfaced as "submitting".
    #[error("relayer unavailable: {0}")]
    RelayerUnavailable(String),

    /// The relayer rejected the submission outright.
    #[error("relayer rejected order: {0}")]
    Rejected(String),

    /// Canonical payload serialization failed.
    #[error("payload serialization failed: {0}")]
    SerializationFailed(String),

    /// The session the tap targeted is not active.
    #[error("grid session {0} is not active")]
    SessionInactive(String),

    /// Order id not present in the store.
    #[error("unknown order: {0}")]
    UnknownOrder(String),

    /// Order state machine violation.
    #[error(transparent)]
    Core(#[from] tapgrid_core::CoreError),
}

impl From<SessionKeyError> for ExecutorError {
    fn from(e: SessionKeyError) -> Self {
        match e {
            SessionKeyError::SigningRejected => Self::SigningRejected,
            other => Self::Signing(other),
        }
    }
}

impl From<RelayerError> for ExecutorError {
    fn from(e: RelayerError) -> Self {
        match e {
            RelayerError::Unavailable(msg) => Self::RelayerUnavailable(msg),
            RelayerError::Protocol(msg) => Self::Rejected(msg),
        }
    }
}

/// Convenience result alias for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
