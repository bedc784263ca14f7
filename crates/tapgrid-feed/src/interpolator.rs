//! Curve construction over the delayed window.
//!
//! Frames are aligned to a fixed tick grid. Each frame is linearly
//! interpolated between its two bracketing real samples; fraction
//! arithmetic stays in `Decimal`, so an interpolated price can never
//! overshoot its bracket. Frames past the newest sample hold the last
//! real price and are marked extrapolated.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use tapgrid_core::{DisplayCurve, InterpolatedFrame, Price};

use crate::buffer::PriceBufferConfig;

/// Nearest real sample at-or-before `t`, searching display then raw.
fn sample_at_or_before(
    display: &BTreeMap<u64, Price>,
    raw: &BTreeMap<u64, Price>,
    t: u64,
) -> Option<(u64, Price)> {
    let a = display.range(..=t).next_back();
    let b = raw.range(..=t).next_back();
    match (a, b) {
        (Some(x), Some(y)) => Some(if x.0 >= y.0 { (*x.0, *x.1) } else { (*y.0, *y.1) }),
        (Some(x), None) => Some((*x.0, *x.1)),
        (None, Some(y)) => Some((*y.0, *y.1)),
        (None, None) => None,
    }
}

/// Nearest real sample strictly after `t`, searching display then raw.
///
/// Still-buffered future raw samples participate here: that is what lets
/// the last frames before the display horizon interpolate toward ticks
/// that have arrived but not yet been promoted.
fn sample_after(
    display: &BTreeMap<u64, Price>,
    raw: &BTreeMap<u64, Price>,
    t: u64,
) -> Option<(u64, Price)> {
    let a = display.range(t + 1..).next();
    let b = raw.range(t + 1..).next();
    match (a, b) {
        (Some(x), Some(y)) => Some(if x.0 <= y.0 { (*x.0, *x.1) } else { (*y.0, *y.1) }),
        (Some(x), None) => Some((*x.0, *x.1)),
        (None, Some(y)) => Some((*y.0, *y.1)),
        (None, None) => None,
    }
}

/// Linear interpolation by elapsed-time fraction, in exact decimals.
fn lerp(a: (u64, Price), b: (u64, Price), t: u64) -> Price {
    debug_assert!(a.0 <= t && t < b.0);
    let span = Decimal::from(b.0 - a.0);
    if span.is_zero() {
        return a.1;
    }
    let frac = Decimal::from(t - a.0) / span;
    a.1 + (b.1 - a.1) * frac
}

/// Build the display curve for the window `[now - retention, now - delay]`.
///
/// Returns an empty, non-stale curve when no samples exist yet.
pub(crate) fn build_curve(
    display: &BTreeMap<u64, Price>,
    raw: &BTreeMap<u64, Price>,
    config: &PriceBufferConfig,
    now_ms: u64,
) -> DisplayCurve {
    let horizon = now_ms.saturating_sub(config.display_delay_ms);
    let window_start = now_ms.saturating_sub(config.retention_ms);

    let first_sample = match (
        display.keys().next().copied(),
        raw.keys().next().copied(),
    ) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    let Some(first_sample) = first_sample else {
        return DisplayCurve::default();
    };

    let newest_sample = sample_at_or_before(display, raw, u64::MAX)
        .map(|(t, _)| t)
        .unwrap_or(first_sample);

    let start = window_start.max(first_sample);
    let interval = config.frame_interval_ms.max(1);

    // First tick at or after `start`, aligned to the fixed frame grid.
    let mut t = start.div_ceil(interval) * interval;
    let mut frames = Vec::with_capacity(((horizon.saturating_sub(t)) / interval + 1) as usize);

    while t <= horizon {
        let before = sample_at_or_before(display, raw, t);
        let after = sample_after(display, raw, t);

        let frame = match (before, after) {
            (Some(a), Some(b)) => InterpolatedFrame {
                time_ms: t,
                price: lerp(a, b, t),
                extrapolated: false,
            },
            // Past the newest sample: hold flat, flag as extrapolated.
            // A frame exactly on the newest sample is still real data.
            (Some(a), None) => InterpolatedFrame {
                time_ms: t,
                price: a.1,
                extrapolated: t > a.0,
            },
            // Before the first sample: clamp at the data edge.
            (None, Some(b)) => InterpolatedFrame {
                time_ms: t,
                price: b.1,
                extrapolated: false,
            },
            (None, None) => unreachable!("window is non-empty"),
        };
        frames.push(frame);
        t += interval;
    }

    let stale =
        now_ms.saturating_sub(newest_sample) > config.display_delay_ms + config.stale_after_ms;

    DisplayCurve { frames, stale }
}
