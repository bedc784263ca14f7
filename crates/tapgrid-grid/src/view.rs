//! Screen/data affine transform.
//!
//! The renderer owns pixels; this core owns (timestamp, price) pairs.
//! Pan and zoom live entirely in this transform, which is composed with
//! `resolve_cell` and never fused into it: changing the view can never
//! change which cell a fixed data point resolves to.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use tapgrid_core::Price;

/// Pure affine mapping between screen pixels and data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Data time rendered at screen x = pan_x_px.
    pub time_origin_ms: u64,
    /// Data price rendered at screen y = pan_y_px.
    pub price_origin: Price,
    /// Horizontal scale: pixels per millisecond.
    pub px_per_ms: f64,
    /// Vertical scale: pixels per price unit.
    pub px_per_price: f64,
    /// Horizontal pan offset in pixels.
    pub pan_x_px: f64,
    /// Vertical pan offset in pixels.
    pub pan_y_px: f64,
}

impl ViewTransform {
    /// Map a data point to screen coordinates (y grows downward).
    #[must_use]
    pub fn data_to_screen(&self, time_ms: u64, price: Price) -> (f64, f64) {
        let dx = time_ms as f64 - self.time_origin_ms as f64;
        let dy = (price - self.price_origin).inner().to_f64().unwrap_or(0.0);
        (
            self.pan_x_px + dx * self.px_per_ms,
            self.pan_y_px - dy * self.px_per_price,
        )
    }

    /// Map screen coordinates back to a data point.
    ///
    /// Returns `None` for degenerate scales or unrepresentable values.
    #[must_use]
    pub fn screen_to_data(&self, x: f64, y: f64) -> Option<(u64, Price)> {
        if self.px_per_ms == 0.0 || self.px_per_price == 0.0 {
            return None;
        }
        let dt = (x - self.pan_x_px) / self.px_per_ms;
        let time = self.time_origin_ms as f64 + dt;
        if !time.is_finite() || time < 0.0 {
            return None;
        }

        let dp = (self.pan_y_px - y) / self.px_per_price;
        let price = self.price_origin + Price::new(Decimal::from_f64(dp)?);

        Some((time.round() as u64, price))
    }

    /// A copy of this transform panned by pixel deltas.
    #[must_use]
    pub fn panned(&self, dx_px: f64, dy_px: f64) -> Self {
        Self {
            pan_x_px: self.pan_x_px + dx_px,
            pan_y_px: self.pan_y_px + dy_px,
            ..*self
        }
    }

    /// A copy of this transform zoomed by the given factors.
    #[must_use]
    pub fn zoomed(&self, fx: f64, fy: f64) -> Self {
        Self {
            px_per_ms: self.px_per_ms * fx,
            px_per_price: self.px_per_price * fy,
            ..*self
        }
    }
}
