//! Order lifecycle types.
//!
//! A tapped cell becomes exactly one `GridOrder` carrying the full
//! configured collateral. The lifecycle controller is the sole writer of
//! order state; these types only encode which transitions are legal.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::grid::CellId;
use crate::session::SessionId;
use crate::Price;

/// Unique order identifier.
///
/// Every order gets a fresh id so retries and re-signs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new unique order ID.
    ///
    /// Format: `grid_{timestamp_ms}_{uuid_short}`
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("grid_{now_ms}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing responses).
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of an order in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Signed and submitted (or awaiting submission), not yet confirmed.
    #[default]
    Pending,
    /// The trader's nonce counter advanced past this order's embedded
    /// nonce before acceptance; awaiting re-sign.
    NeedsResign,
    /// Remote relayer confirmed execution.
    Executed,
    /// Declined, timed out, or cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled)
    }

    /// Returns true when the lifecycle machine permits `self -> next`.
    ///
    /// Legal transitions:
    /// - Pending -> Executed (remote confirms)
    /// - Pending -> NeedsResign (nonce advanced before acceptance)
    /// - Pending -> Cancelled (submit timeout or decline)
    /// - NeedsResign -> Pending (successful re-sign with fresh nonce)
    /// - NeedsResign -> Cancelled (owner declines)
    #[must_use]
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executed)
                | (Self::Pending, Self::NeedsResign)
                | (Self::Pending, Self::Cancelled)
                | (Self::NeedsResign, Self::Pending)
                | (Self::NeedsResign, Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::NeedsResign => write!(f, "NEEDS_RESIGN"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A time-boxed, price-boxed position placed by tapping a grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridOrder {
    /// Client-assigned order identifier.
    pub id: OrderId,
    /// Session this order was placed under.
    pub grid_session_id: SessionId,
    /// Tapped cell.
    pub cell: CellId,
    /// Trader placing the order.
    pub trader: Address,
    /// Market symbol.
    pub symbol: String,
    /// Direction: true = long (target above entry).
    pub is_long: bool,
    /// Collateral committed to this order.
    pub collateral: Decimal,
    /// Leverage applied.
    pub leverage: u32,
    /// Target trigger price (midpoint of the cell's price range).
    pub trigger_price: Price,
    /// Window start in milliseconds (cell column start).
    pub start_time_ms: u64,
    /// Window end in milliseconds (cell column end).
    pub end_time_ms: u64,
    /// Nonce embedded in the signed payload.
    pub nonce: u64,
    /// Hex-encoded signature over the canonical payload hash.
    pub signature: Option<String>,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Creation time in milliseconds since Unix epoch.
    pub created_at_ms: u64,
    /// Last state-change time in milliseconds since Unix epoch.
    pub updated_at_ms: u64,
}

impl GridOrder {
    /// Apply a lifecycle transition, enforcing the legal-transition set.
    ///
    /// # Errors
    /// Returns `CoreError::IllegalTransition` when the machine forbids it.
    pub fn transition(&mut self, next: OrderStatus, now_ms: u64) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at_ms = now_ms;
        Ok(())
    }
}
