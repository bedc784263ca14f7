//! Error types for telemetry initialization.

use thiserror::Error;

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global tracing subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Convenience result alias for telemetry operations.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
