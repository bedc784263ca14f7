//! Error types for tap resolution.

use thiserror::Error;

use tapgrid_core::CellId;

/// Errors raised while resolving taps against the grid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The tapped column's window ends too soon for the backend to lock
    /// the order before it begins. Rejected locally, no network call.
    #[error("column {column} is not playable: window ends at {time_end_ms}ms, lead deadline {deadline_ms}ms")]
    ColumnNotPlayable {
        column: i64,
        time_end_ms: u64,
        deadline_ms: u64,
    },

    /// Cell index escaped the representable range (degenerate geometry).
    #[error("cell index out of range for {0}")]
    CellOutOfRange(CellId),
}

/// Convenience result alias for grid operations.
pub type GridResult<T> = std::result::Result<T, GridError>;
