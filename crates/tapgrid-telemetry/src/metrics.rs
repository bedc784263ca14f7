//! Prometheus metrics for the tapgrid client.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration
//! fails, it indicates a fatal configuration error (e.g., duplicate
//! metric names) that should crash at startup rather than fail silently.
//! These panics only occur during static initialization, never at
//! runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, IntCounter,
    IntGauge,
};

/// Total price ticks ingested from the feed.
pub static SAMPLES_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tapgrid_samples_ingested_total",
        "Total price ticks ingested"
    )
    .unwrap()
});

/// Total curve recomputations.
pub static FRAMES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tapgrid_frames_total",
        "Total display curve recomputations"
    )
    .unwrap()
});

/// Feed staleness state (1 = stale, 0 = live).
pub static FEED_STALE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tapgrid_feed_stale", "Feed staleness (1=stale)").unwrap()
});

/// Tap resolutions by outcome.
/// Labels: outcome (placed/unplayable/rejected/declined)
pub static TAPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tapgrid_taps_total",
        "Tap resolutions by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Order lifecycle transitions by resulting status.
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tapgrid_orders_total",
        "Order transitions by resulting status",
        &["status"]
    )
    .unwrap()
});

/// Re-sign attempts by result.
pub static RESIGN_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tapgrid_resign_attempts_total",
        "Re-sign attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Facade with typed helpers for the hot paths.
pub struct Metrics;

impl Metrics {
    /// Record an ingested tick.
    pub fn tick_ingested() {
        SAMPLES_INGESTED.inc();
    }

    /// Record a curve recomputation.
    pub fn frame_rendered() {
        FRAMES_TOTAL.inc();
    }

    /// Publish the feed staleness state.
    pub fn set_feed_stale(stale: bool) {
        FEED_STALE.set(i64::from(stale));
    }

    /// Record a tap resolution outcome.
    pub fn tap(outcome: &str) {
        TAPS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record an order reaching a status.
    pub fn order_status(status: &str) {
        ORDERS_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record a re-sign attempt result.
    pub fn resign_attempt(result: &str) {
        RESIGN_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = SAMPLES_INGESTED.get();
        Metrics::tick_ingested();
        assert_eq!(SAMPLES_INGESTED.get(), before + 1);

        Metrics::set_feed_stale(true);
        assert_eq!(FEED_STALE.get(), 1);
        Metrics::set_feed_stale(false);
        assert_eq!(FEED_STALE.get(), 0);
    }

    #[test]
    fn test_labelled_counters() {
        let before = TAPS_TOTAL.with_label_values(&["placed"]).get();
        Metrics::tap("placed");
        assert_eq!(TAPS_TOTAL.with_label_values(&["placed"]).get(), before + 1.0);
    }
}
