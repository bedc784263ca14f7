//! Grid coordinate contract types.
//!
//! A cell is one (time-window x price-range) rectangle addressed by
//! (column, row). Cell identity is a total function of (timestamp, price,
//! config): client and settlement backend must resolve the same cell to
//! the cent and millisecond, so the geometry is fixed once per session and
//! carried as exact decimals.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::Price;

/// Price step specification supplied at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceStep {
    /// Absolute step in price units (e.g. $10).
    Absolute(Price),
    /// Step as a percentage of the anchor price, resolved exactly once.
    Percent(rust_decimal::Decimal),
}

/// Grid geometry, fixed for a session's lifetime.
///
/// `price_step` is always an absolute, already-resolved value. A
/// percent-based step is converted against the anchor price in
/// [`GridConfig::resolve`] and never recomputed from a moving price:
/// recomputation would silently re-address previously placed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Column width in milliseconds.
    pub time_step_ms: u64,
    /// Row height in absolute price units.
    pub price_step: Price,
    /// Time anchor (column 0 starts here).
    pub anchor_time_ms: u64,
    /// Price anchor (row 0 starts here).
    pub anchor_price: Price,
}

impl GridConfig {
    /// Resolve a grid configuration from a step specification.
    ///
    /// Percent steps are converted against `anchor_price` here, exactly
    /// once. There is deliberately no API to re-derive the step later.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidGridStep` for non-positive steps and
    /// `CoreError::InvalidAnchorPrice` when a percent step is requested
    /// with a non-positive anchor.
    pub fn resolve(
        time_step_ms: u64,
        step: PriceStep,
        anchor_time_ms: u64,
        anchor_price: Price,
    ) -> Result<Self, CoreError> {
        if time_step_ms == 0 {
            return Err(CoreError::InvalidGridStep("time step must be > 0".into()));
        }

        let price_step = match step {
            PriceStep::Absolute(p) => p,
            PriceStep::Percent(pct) => {
                if !anchor_price.is_positive() {
                    return Err(CoreError::InvalidAnchorPrice(anchor_price.to_string()));
                }
                anchor_price * (pct / rust_decimal::Decimal::from(100))
            }
        };

        if !price_step.is_positive() {
            return Err(CoreError::InvalidGridStep(price_step.to_string()));
        }

        Ok(Self {
            time_step_ms,
            price_step,
            anchor_time_ms,
            anchor_price,
        })
    }
}

/// Discrete cell identifier: (column, row).
///
/// Deterministic for any point inside the same half-open interval and
/// independent of view scroll/pan/zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    /// Time axis index.
    pub column: i64,
    /// Price axis index.
    pub row: i64,
}

impl CellId {
    /// Create a new cell identifier.
    #[must_use]
    pub fn new(column: i64, row: i64) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.column, self.row)
    }
}

/// Inverse bounds of a cell: half-open on both axes.
///
/// `time_start_ms <= t < time_end_ms`, `price_low <= p < price_high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBounds {
    /// Inclusive lower price bound.
    pub price_low: Price,
    /// Exclusive upper price bound.
    pub price_high: Price,
    /// Inclusive window start in milliseconds.
    pub time_start_ms: u64,
    /// Exclusive window end in milliseconds.
    pub time_end_ms: u64,
}

impl CellBounds {
    /// Returns true when (time, price) lies inside these bounds.
    #[must_use]
    pub fn contains(&self, time_ms: u64, price: Price) -> bool {
        time_ms >= self.time_start_ms
            && time_ms < self.time_end_ms
            && price >= self.price_low
            && price < self.price_high
    }

    /// Midpoint of the price range, used as the order trigger price.
    #[must_use]
    pub fn price_mid(&self) -> Price {
        self.price_low.midpoint(self.price_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_resolve_absolute_step() {
        let config = GridConfig::resolve(
            10_000,
            PriceStep::Absolute(Price::new(dec!(10))),
            0,
            Price::ZERO,
        )
        .unwrap();
        assert_eq!(config.price_step, Price::new(dec!(10)));
    }

    #[test]
    fn test_resolve_percent_step_uses_anchor_once() {
        let config = GridConfig::resolve(
            10_000,
            PriceStep::Percent(dec!(0.02)),
            0,
            Price::new(dec!(50000)),
        )
        .unwrap();
        // 0.02% of 50000 = 10
        assert_eq!(config.price_step, Price::new(dec!(10)));
    }

    #[test]
    fn test_resolve_rejects_zero_time_step() {
        let err = GridConfig::resolve(0, PriceStep::Absolute(Price::ONE), 0, Price::ZERO);
        assert!(matches!(err, Err(CoreError::InvalidGridStep(_))));
    }

    #[test]
    fn test_resolve_percent_rejects_zero_anchor() {
        let err = GridConfig::resolve(10_000, PriceStep::Percent(dec!(1)), 0, Price::ZERO);
        assert!(matches!(err, Err(CoreError::InvalidAnchorPrice(_))));
    }

    #[test]
    fn test_bounds_half_open() {
        let bounds = CellBounds {
            price_low: Price::new(dec!(50000)),
            price_high: Price::new(dec!(50010)),
            time_start_ms: 1_000_000,
            time_end_ms: 1_010_000,
        };

        assert!(bounds.contains(1_000_000, Price::new(dec!(50000))));
        assert!(bounds.contains(1_009_999, Price::new(dec!(50009.99))));
        assert!(!bounds.contains(1_010_000, Price::new(dec!(50005))));
        assert!(!bounds.contains(1_005_000, Price::new(dec!(50010))));
    }

    #[test]
    fn test_bounds_price_mid() {
        let bounds = CellBounds {
            price_low: Price::new(dec!(50000)),
            price_high: Price::new(dec!(50010)),
            time_start_ms: 0,
            time_end_ms: 10_000,
        };
        assert_eq!(bounds.price_mid(), Price::new(dec!(50005)));
    }
}
