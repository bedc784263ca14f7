//! Grid session types.
//!
//! A grid session binds a trader's tap-to-trade mode to a fixed grid
//! geometry and anchors. The remote grid session service is the single
//! source of truth for anchors once the session is created; this type is
//! the sole writer of its own fields on the client side.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::grid::{GridConfig, PriceStep};
use crate::Price;

/// Unique grid session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new unique session identifier.
    ///
    /// Format: `gs_{timestamp_ms}_{uuid_short}`
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("gs_{now_ms}_{uuid_short}"))
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

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-side request to create a grid session.
///
/// The price step may be absolute or percent-based; percent steps are
/// resolved against the anchor price exactly once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSessionRequest {
    /// Trader placing orders in this session.
    pub trader: Address,
    /// Market symbol (e.g. "BTC-USD").
    pub symbol: String,
    /// Total margin allocated to the session.
    pub margin_total: Decimal,
    /// Leverage applied to each order.
    pub leverage: u32,
    /// Column width in seconds.
    pub time_step_secs: u64,
    /// Candles rendered per column (display hint, not part of cell identity).
    pub column_candle_span: u32,
    /// Price step specification.
    pub price_step: PriceStep,
}

/// Active grid session configuration.
///
/// One active session per trader. Destroyed on deactivation, session-key
/// expiry, or disconnect recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSession {
    /// Session identifier assigned by the session service.
    pub id: SessionId,
    /// Trader bound to this session.
    pub trader: Address,
    /// Market symbol.
    pub symbol: String,
    /// Total margin allocated to the session.
    pub margin_total: Decimal,
    /// Leverage applied to each order.
    pub leverage: u32,
    /// Column width in milliseconds.
    pub time_step_ms: u64,
    /// Candles rendered per column.
    pub column_candle_span: u32,
    /// Resolved absolute price step. Fixed for the session's lifetime.
    pub price_step: Price,
    /// Time anchor assigned at creation.
    pub anchor_time_ms: u64,
    /// Price anchor assigned at creation.
    pub anchor_price: Price,
    /// Whether the session is accepting taps.
    pub is_active: bool,
    /// Creation time in milliseconds since Unix epoch.
    pub created_at_ms: u64,
}

impl GridSession {
    /// Build a session from a creation request and service-assigned anchors.
    ///
    /// Resolves the price step against the anchor exactly once.
    ///
    /// # Errors
    /// Propagates `CoreError` for invalid steps or anchors.
    pub fn from_request(
        request: &GridSessionRequest,
        id: SessionId,
        anchor_time_ms: u64,
        anchor_price: Price,
        created_at_ms: u64,
    ) -> Result<Self, CoreError> {
        let config = GridConfig::resolve(
            request.time_step_secs * 1000,
            request.price_step,
            anchor_time_ms,
            anchor_price,
        )?;

        Ok(Self {
            id,
            trader: request.trader,
            symbol: request.symbol.clone(),
            margin_total: request.margin_total,
            leverage: request.leverage,
            time_step_ms: config.time_step_ms,
            column_candle_span: request.column_candle_span,
            price_step: config.price_step,
            anchor_time_ms,
            anchor_price,
            is_active: true,
            created_at_ms,
        })
    }

    /// The grid geometry this session is locked to.
    #[must_use]
    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            time_step_ms: self.time_step_ms,
            price_step: self.price_step,
            anchor_time_ms: self.anchor_time_ms,
            anchor_price: self.anchor_price,
        }
    }

    /// Collateral carried by each tap: the full configured margin.
    #[must_use]
    pub fn collateral_per_order(&self) -> Decimal {
        self.margin_total
    }
}
