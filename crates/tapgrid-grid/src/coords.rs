//! Cell resolution and inverse bounds.
//!
//! `resolve_cell` and `cell_bounds` are exact inverses: any point inside
//! a cell's half-open bounds resolves back to the same cell. Both are
//! pure functions of the session's fixed `GridConfig`; nothing about the
//! current view (pan, scroll, zoom) participates.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use tapgrid_core::{CellBounds, CellId, GridConfig, Price};

use crate::error::{GridError, GridResult};

/// Default minimum lead time before a column's window opens.
///
/// The backend needs this long to lock an order before its window begins.
pub const DEFAULT_MIN_LEAD_MS: u64 = 1_500;

/// Resolves taps and cells against one session's grid geometry.
#[derive(Debug, Clone, Copy)]
pub struct GridCoordinateSystem {
    config: GridConfig,
    min_lead_ms: u64,
}

impl GridCoordinateSystem {
    /// Create a coordinate system with the default minimum lead time.
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        Self::with_min_lead(config, DEFAULT_MIN_LEAD_MS)
    }

    /// Create a coordinate system with an explicit minimum lead time.
    #[must_use]
    pub fn with_min_lead(config: GridConfig, min_lead_ms: u64) -> Self {
        Self {
            config,
            min_lead_ms,
        }
    }

    /// The fixed geometry this system resolves against.
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Resolve a (timestamp, price) pair to its cell.
    ///
    /// Euclidean floor division on both axes: identical for any point
    /// inside the same half-open interval, including negative indices.
    ///
    /// # Errors
    /// `GridError::CellOutOfRange` when the row index cannot be
    /// represented (degenerate geometry, astronomically distant price).
    pub fn resolve_cell(&self, time_ms: u64, price: Price) -> GridResult<CellId> {
        let column = (time_ms as i64 - self.config.anchor_time_ms as i64)
            .div_euclid(self.config.time_step_ms as i64);

        let row_decimal =
            ((price - self.config.anchor_price).inner() / self.config.price_step.inner()).floor();
        let row = row_decimal
            .to_i64()
            .ok_or(GridError::CellOutOfRange(CellId::new(column, 0)))?;

        Ok(CellId::new(column, row))
    }

    /// Inverse of [`resolve_cell`]: the half-open bounds of a cell.
    ///
    /// # Errors
    /// `GridError::CellOutOfRange` when the column starts before the
    /// Unix epoch (columns are only addressable in non-negative time).
    ///
    /// [`resolve_cell`]: Self::resolve_cell
    pub fn cell_bounds(&self, cell: CellId) -> GridResult<CellBounds> {
        let start = self.config.anchor_time_ms as i64
            + cell.column * self.config.time_step_ms as i64;
        if start < 0 {
            return Err(GridError::CellOutOfRange(cell));
        }
        let time_start_ms = start as u64;
        let time_end_ms = time_start_ms + self.config.time_step_ms;

        let price_low =
            self.config.anchor_price + self.config.price_step * Decimal::from(cell.row);
        let price_high = price_low + self.config.price_step;

        Ok(CellBounds {
            price_low,
            price_high,
            time_start_ms,
            time_end_ms,
        })
    }

    /// Resolve a tap, enforcing the playable-window rule.
    ///
    /// A column whose window does not end strictly after
    /// `now + min_lead` is excluded from tap resolution (it may still
    /// render). Rejection happens locally, before any network call.
    ///
    /// # Errors
    /// `GridError::ColumnNotPlayable` for late columns; propagates
    /// out-of-range errors.
    pub fn resolve_tap(&self, time_ms: u64, price: Price, now_ms: u64) -> GridResult<CellId> {
        let cell = self.resolve_cell(time_ms, price)?;
        let bounds = self.cell_bounds(cell)?;
        let deadline_ms = now_ms + self.min_lead_ms;

        if bounds.time_end_ms <= deadline_ms {
            debug!(
                column = cell.column,
                time_end_ms = bounds.time_end_ms,
                deadline_ms,
                "tap rejected: column not playable"
            );
            return Err(GridError::ColumnNotPlayable {
                column: cell.column,
                time_end_ms: bounds.time_end_ms,
                deadline_ms,
            });
        }

        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tapgrid_core::PriceStep;

    fn system() -> GridCoordinateSystem {
        // time step 10s, price step $10, anchors at zero.
        let config = GridConfig::resolve(
            10_000,
            PriceStep::Absolute(Price::new(dec!(10))),
            0,
            Price::ZERO,
        )
        .unwrap();
        GridCoordinateSystem::new(config)
    }

    #[test]
    fn test_scenario_tap_resolution() {
        // Tap at t=1000s, p=50005 -> cell (100, 5000),
        // bounds time [1000s, 1010s), price [50000, 50010).
        let sys = system();
        let cell = sys
            .resolve_cell(1_000_000, Price::new(dec!(50005)))
            .unwrap();
        assert_eq!(cell, CellId::new(100, 5000));

        let bounds = sys.cell_bounds(cell).unwrap();
        assert_eq!(bounds.time_start_ms, 1_000_000);
        assert_eq!(bounds.time_end_ms, 1_010_000);
        assert_eq!(bounds.price_low, Price::new(dec!(50000)));
        assert_eq!(bounds.price_high, Price::new(dec!(50010)));
    }

    #[test]
    fn test_round_trip_contains_point() {
        let sys = system();
        let cases = [
            (1_000_000u64, dec!(50005)),
            (999_999, dec!(49999.99)),
            (5, dec!(0.01)),
            (123_456, dec!(7.77)),
            (1_010_000, dec!(50010)),
        ];

        for (t, p) in cases {
            let price = Price::new(p);
            let cell = sys.resolve_cell(t, price).unwrap();
            let bounds = sys.cell_bounds(cell).unwrap();
            assert!(
                bounds.contains(t, price),
                "bounds {bounds:?} must contain ({t}, {price})"
            );
        }
    }

    #[test]
    fn test_half_open_boundary_rolls_to_next_cell() {
        let sys = system();

        // Exactly on a price boundary belongs to the upper cell.
        let on_boundary = sys.resolve_cell(1_000_000, Price::new(dec!(50010))).unwrap();
        assert_eq!(on_boundary.row, 5001);

        // Exactly on a time boundary belongs to the next column.
        let next_column = sys.resolve_cell(1_010_000, Price::new(dec!(50005))).unwrap();
        assert_eq!(next_column.column, 101);
    }

    #[test]
    fn test_negative_row_resolution() {
        let sys = system();
        let cell = sys.resolve_cell(5_000, Price::new(dec!(-0.01))).unwrap();
        assert_eq!(cell.row, -1);

        let bounds = sys.cell_bounds(cell).unwrap();
        assert_eq!(bounds.price_low, Price::new(dec!(-10)));
        assert!(bounds.contains(5_000, Price::new(dec!(-0.01))));
    }

    #[test]
    fn test_anchored_grid_offsets_cells() {
        let config = GridConfig::resolve(
            10_000,
            PriceStep::Absolute(Price::new(dec!(10))),
            3_000,
            Price::new(dec!(50_001)),
        )
        .unwrap();
        let sys = GridCoordinateSystem::new(config);

        let cell = sys.resolve_cell(3_000, Price::new(dec!(50_001))).unwrap();
        assert_eq!(cell, CellId::new(0, 0));

        let bounds = sys.cell_bounds(cell).unwrap();
        assert_eq!(bounds.time_start_ms, 3_000);
        assert_eq!(bounds.price_low, Price::new(dec!(50_001)));
    }

    #[test]
    fn test_unplayable_column_rejected() {
        let sys = system();
        let now = 1_005_000; // inside column 100

        // Column 100 ends at 1_010_000; deadline is now + 1_500.
        // 1_010_000 > 1_006_500, so still playable.
        assert!(sys
            .resolve_tap(1_000_000, Price::new(dec!(50005)), now)
            .is_ok());

        // At now = 1_008_500 the deadline equals the window end: rejected.
        let err = sys.resolve_tap(1_000_000, Price::new(dec!(50005)), 1_008_500);
        assert!(matches!(err, Err(GridError::ColumnNotPlayable { .. })));

        // A column further out is unaffected.
        assert!(sys
            .resolve_tap(1_020_000, Price::new(dec!(50005)), 1_008_500)
            .is_ok());
    }

    #[test]
    fn test_bounds_before_epoch_rejected() {
        let sys = system();
        let cell = CellId::new(-1, 0);
        assert!(matches!(
            sys.cell_bounds(cell),
            Err(GridError::CellOutOfRange(_))
        ));
    }
}
