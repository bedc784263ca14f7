//! Two-stage price buffer with a fixed display delay.
//!
//! Ticks land in the raw arrival buffer in any order. A periodic
//! promotion step (period much shorter than the display delay) moves
//! samples older than `now - display_delay` into the display buffer,
//! deduplicating by timestamp, and evicts both buffers past the
//! retention window.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::trace;

use tapgrid_core::{Clock, DisplayCurve, Price, PriceSample};

use crate::error::{FeedError, FeedResult};
use crate::interpolator;

/// Tuning for the price buffer and its loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBufferConfig {
    /// Fixed display delay in milliseconds. Every rendered frame is at
    /// least this old, guaranteeing real-sample brackets.
    #[serde(default = "default_display_delay_ms")]
    pub display_delay_ms: u64,
    /// Samples older than this are evicted.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,
    /// Period of the promotion step. Must be well below the delay.
    #[serde(default = "default_promotion_interval_ms")]
    pub promotion_interval_ms: u64,
    /// Frame tick width in milliseconds (~60 Hz).
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Silence beyond `display_delay + stale_after` marks the curve stale.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

fn default_display_delay_ms() -> u64 {
    1_500
}

fn default_retention_ms() -> u64 {
    60_000
}

fn default_promotion_interval_ms() -> u64 {
    250
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_stale_after_ms() -> u64 {
    2_000
}

impl Default for PriceBufferConfig {
    fn default() -> Self {
        Self {
            display_delay_ms: default_display_delay_ms(),
            retention_ms: default_retention_ms(),
            promotion_interval_ms: default_promotion_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl PriceBufferConfig {
    /// Validate internal consistency.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidConfig` when intervals are zero or the
    /// promotion period is not shorter than the display delay.
    pub fn validate(&self) -> FeedResult<()> {
        if self.frame_interval_ms == 0 || self.promotion_interval_ms == 0 {
            return Err(FeedError::InvalidConfig("intervals must be > 0".into()));
        }
        if self.promotion_interval_ms >= self.display_delay_ms {
            return Err(FeedError::InvalidConfig(
                "promotion interval must be shorter than the display delay".into(),
            ));
        }
        if self.retention_ms <= self.display_delay_ms {
            return Err(FeedError::InvalidConfig(
                "retention must exceed the display delay".into(),
            ));
        }
        Ok(())
    }
}

/// Raw and display sample stores, guarded together so promotion moves
/// samples atomically with respect to curve builds.
#[derive(Debug, Default)]
struct Buffers {
    raw: BTreeMap<u64, Price>,
    display: BTreeMap<u64, Price>,
}

/// Ingests timestamped ticks and emits a smoothed, delayed curve.
///
/// Thread-safe; `ingest` never blocks on the frame loop beyond a short
/// critical section.
pub struct PriceBuffer<C: Clock> {
    config: PriceBufferConfig,
    buffers: Mutex<Buffers>,
    snapshot: RwLock<DisplayCurve>,
    clock: C,
}

impl<C: Clock> PriceBuffer<C> {
    /// Create a new buffer with the given configuration and clock.
    ///
    /// # Errors
    /// Propagates configuration validation failures.
    pub fn new(config: PriceBufferConfig, clock: C) -> FeedResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buffers: Mutex::new(Buffers::default()),
            snapshot: RwLock::new(DisplayCurve::default()),
            clock,
        })
    }

    /// Buffer configuration.
    #[must_use]
    pub fn config(&self) -> &PriceBufferConfig {
        &self.config
    }

    /// Ingest a tick. Non-blocking, tolerant of out-of-order arrival;
    /// a duplicate timestamp in the arrival buffer is last-write-wins.
    pub fn ingest(&self, sample: PriceSample) {
        let mut buffers = self.buffers.lock();
        buffers.raw.insert(sample.time_ms, sample.price);
        trace!(time_ms = sample.time_ms, price = %sample.price, "tick ingested");
    }

    /// Promotion step: move matured samples from raw to display and evict
    /// both buffers past retention. Driven by an independent timer.
    pub fn promote(&self) {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(self.config.display_delay_ms);
        let evict_before = now.saturating_sub(self.config.retention_ms);

        let mut buffers = self.buffers.lock();

        let matured: Vec<(u64, Price)> = buffers
            .raw
            .range(..=cutoff)
            .map(|(t, p)| (*t, *p))
            .collect();
        for (t, p) in matured {
            buffers.raw.remove(&t);
            // First write wins: a promoted sample is already on screen.
            buffers.display.entry(t).or_insert(p);
        }

        buffers.raw = buffers.raw.split_off(&evict_before);
        buffers.display = buffers.display.split_off(&evict_before);
    }

    /// Recompute the interpolated curve and publish it as the snapshot.
    ///
    /// Called by the frame loop; cheap enough to run at ~60 Hz.
    pub fn recompute(&self) -> DisplayCurve {
        let now = self.clock.now_ms();
        let curve = {
            let buffers = self.buffers.lock();
            interpolator::build_curve(&buffers.display, &buffers.raw, &self.config, now)
        };
        *self.snapshot.write() = curve.clone();
        curve
    }

    /// Latest published curve snapshot. Read-only view for renderers.
    #[must_use]
    pub fn curve(&self) -> DisplayCurve {
        self.snapshot.read().clone()
    }

    /// Detectable degraded state: the feed has gone silent past the
    /// staleness threshold. Never an error, never a stalled loop.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let now = self.clock.now_ms();
        let buffers = self.buffers.lock();
        let newest = buffers
            .raw
            .keys()
            .next_back()
            .copied()
            .max(buffers.display.keys().next_back().copied());
        match newest {
            Some(t) => {
                now.saturating_sub(t) > self.config.display_delay_ms + self.config.stale_after_ms
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;

    /// Mock clock for testing with controllable time.
    struct MockClock {
        time_ms: AtomicU64,
    }

    impl MockClock {
        fn new(initial_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                time_ms: AtomicU64::new(initial_ms),
            })
        }

        fn set(&self, time_ms: u64) {
            self.time_ms.store(time_ms, Ordering::Release);
        }

        fn advance(&self, delta_ms: u64) {
            self.time_ms.fetch_add(delta_ms, Ordering::AcqRel);
        }
    }

    impl Clock for MockClock {
        fn now_ms(&self) -> u64 {
            self.time_ms.load(Ordering::Acquire)
        }
    }

    const BASE: u64 = 1_000_000;

    fn buffer(clock: Arc<MockClock>) -> PriceBuffer<Arc<MockClock>> {
        PriceBuffer::new(PriceBufferConfig::default(), clock).unwrap()
    }

    fn sample(t: u64, p: rust_decimal::Decimal) -> PriceSample {
        PriceSample::new(t, Price::new(p))
    }

    #[test]
    fn test_config_validation() {
        let bad = PriceBufferConfig {
            promotion_interval_ms: 2_000,
            display_delay_ms: 1_500,
            ..PriceBufferConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(PriceBufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_order_ingest_is_sorted() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        buf.ingest(sample(BASE - 2_000, dec!(101)));
        buf.ingest(sample(BASE - 4_000, dec!(100)));
        buf.ingest(sample(BASE - 3_000, dec!(102)));
        buf.promote();

        let curve = buf.recompute();
        for pair in curve.frames.windows(2) {
            assert!(pair[1].time_ms > pair[0].time_ms);
        }
    }

    #[test]
    fn test_promotion_moves_only_matured_samples() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        // One matured (older than delay), one still inside the delay.
        buf.ingest(sample(BASE - 2_000, dec!(100)));
        buf.ingest(sample(BASE - 500, dec!(110)));
        buf.promote();

        let buffers = buf.buffers.lock();
        assert!(buffers.display.contains_key(&(BASE - 2_000)));
        assert!(buffers.raw.contains_key(&(BASE - 500)));
        assert!(!buffers.display.contains_key(&(BASE - 500)));
    }

    #[test]
    fn test_promotion_dedup_first_write_wins() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        buf.ingest(sample(BASE - 2_000, dec!(100)));
        buf.promote();
        // Late duplicate for an already-promoted timestamp.
        buf.ingest(sample(BASE - 2_000, dec!(999)));
        buf.promote();

        let buffers = buf.buffers.lock();
        assert_eq!(buffers.display[&(BASE - 2_000)], Price::new(dec!(100)));
    }

    #[test]
    fn test_eviction_past_retention() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        buf.ingest(sample(BASE - 10_000, dec!(100)));
        buf.promote();
        clock.advance(60_000);
        buf.promote();

        let buffers = buf.buffers.lock();
        assert!(buffers.display.is_empty());
        assert!(buffers.raw.is_empty());
    }

    #[test]
    fn test_stale_detection_and_recovery_without_jump() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        // Steady ticks every 250ms, then 3s of silence.
        for i in 0..8u64 {
            buf.ingest(sample(BASE - 4_000 + i * 250, dec!(100) + rust_decimal::Decimal::from(i)));
        }
        let last_tick = BASE - 4_000 + 7 * 250; // price 107
        buf.promote();

        clock.set(last_tick + 4_000); // > delay 1.5s + stale 2s
        buf.promote();
        let curve = buf.recompute();
        assert!(curve.stale);
        assert!(buf.is_stale());

        let tail: Vec<_> = curve
            .frames
            .iter()
            .filter(|f| f.time_ms > last_tick)
            .collect();
        assert!(!tail.is_empty(), "silence must keep producing frames");
        for frame in &tail {
            assert!(frame.extrapolated);
            assert_eq!(frame.price, Price::new(dec!(107)));
        }

        // Feed resumes: interpolation continues from the same sample the
        // flat tail was holding, so there is no discontinuity.
        let resume_tick = last_tick + 4_500;
        buf.ingest(sample(resume_tick, dec!(110)));
        clock.set(resume_tick + 2_000);
        buf.promote();
        let curve = buf.recompute();
        assert!(!curve.stale);
        assert!(!buf.is_stale());

        let bridged: Vec<_> = curve
            .frames
            .iter()
            .filter(|f| f.time_ms > last_tick && f.time_ms <= resume_tick)
            .collect();
        assert!(!bridged.is_empty());
        for frame in bridged {
            assert!(!frame.extrapolated);
            assert!(
                frame.price >= Price::new(dec!(107)) && frame.price <= Price::new(dec!(110)),
                "resumed frame escaped its bracket: {}",
                frame.price
            );
        }
    }

    #[test]
    fn test_snapshot_reflects_latest_recompute() {
        let clock = MockClock::new(BASE);
        let buf = buffer(Arc::clone(&clock));

        assert!(buf.curve().is_empty());
        buf.ingest(sample(BASE - 3_000, dec!(100)));
        buf.ingest(sample(BASE - 2_000, dec!(104)));
        buf.promote();
        buf.recompute();

        assert!(!buf.curve().is_empty());
    }
}
