//! Feed data types.
//!
//! `PriceSample` is what the ticker delivers; `InterpolatedFrame` is what
//! the renderer consumes. Frames are derived continuously and never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::Price;

/// A timestamped price tick from the market data feed.
///
/// Immutable once created. Arrival order is not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Sample time in milliseconds since Unix epoch.
    pub time_ms: u64,
    /// Observed price.
    pub price: Price,
}

impl PriceSample {
    /// Create a new price sample.
    #[must_use]
    pub fn new(time_ms: u64, price: Price) -> Self {
        Self { time_ms, price }
    }
}

/// A derived sample aligned to the fixed frame grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolatedFrame {
    /// Frame time in milliseconds since Unix epoch.
    pub time_ms: u64,
    /// Interpolated (or clamped) price.
    pub price: Price,
    /// True when this frame lies beyond the newest real sample and was
    /// flat-extrapolated rather than bracketed by two real ticks.
    pub extrapolated: bool,
}

/// Snapshot of the smoothed display curve.
///
/// `frames` are strictly increasing in time. `stale` is the detectable
/// degraded state: the feed has gone silent past the staleness threshold
/// and the tail of the curve is flat extrapolation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCurve {
    /// Time-ordered interpolated frames.
    pub frames: Vec<InterpolatedFrame>,
    /// True when the underlying feed is stale.
    pub stale: bool,
}

impl DisplayCurve {
    /// Returns the most recent frame, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&InterpolatedFrame> {
        self.frames.last()
    }

    /// Returns true when the curve carries no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_curve_latest() {
        let curve = DisplayCurve {
            frames: vec![
                InterpolatedFrame {
                    time_ms: 1000,
                    price: Price::new(dec!(100)),
                    extrapolated: false,
                },
                InterpolatedFrame {
                    time_ms: 1016,
                    price: Price::new(dec!(101)),
                    extrapolated: false,
                },
            ],
            stale: false,
        };
        assert_eq!(curve.latest().unwrap().time_ms, 1016);
        assert!(!curve.is_empty());
    }

    #[test]
    fn test_empty_curve() {
        let curve = DisplayCurve::default();
        assert!(curve.latest().is_none());
        assert!(curve.is_empty());
        assert!(!curve.stale);
    }
}
