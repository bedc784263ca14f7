//! Background loops driving the price buffer.
//!
//! Two independent periodic tasks: a promotion timer and a ~60 Hz frame
//! loop. The frame loop is cooperative and never blocks on I/O; when it
//! falls behind it drops ticks instead of queueing them.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use tapgrid_core::Clock;

use crate::buffer::PriceBuffer;

/// Owns the promotion and frame tasks for one price buffer.
///
/// `start`/`stop` are idempotent from any state.
pub struct FeedRuntime<C: Clock + 'static> {
    buffer: Arc<PriceBuffer<C>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl<C: Clock + 'static> FeedRuntime<C> {
    /// Create a runtime around a shared buffer. No tasks run until
    /// `start` is called.
    #[must_use]
    pub fn new(buffer: Arc<PriceBuffer<C>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            buffer,
            handles: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// The buffer this runtime drives.
    #[must_use]
    pub fn buffer(&self) -> &Arc<PriceBuffer<C>> {
        &self.buffer
    }

    /// Spawn the promotion and frame loops. No-op when already running.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }

        let config = *self.buffer.config();

        let promo_buffer = Arc::clone(&self.buffer);
        let mut promo_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(config.promotion_interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => promo_buffer.promote(),
                    _ = promo_rx.changed() => break,
                }
            }
            debug!("promotion loop stopped");
        }));

        let frame_buffer = Arc::clone(&self.buffer);
        let mut frame_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(config.frame_interval_ms));
            // Drop frames under load rather than queueing them.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        frame_buffer.recompute();
                    }
                    _ = frame_rx.changed() => break,
                }
            }
            debug!("frame loop stopped");
        }));

        info!(
            promotion_interval_ms = config.promotion_interval_ms,
            frame_interval_ms = config.frame_interval_ms,
            "feed runtime started"
        );
    }

    /// Stop both loops. Safe to call repeatedly and from any state.
    pub fn stop(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        let _ = self.shutdown.send(true);
        for handle in handles {
            handle.abort();
        }
        info!("feed runtime stopped");
    }

    /// Whether the loops are currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handles.lock().is_empty()
    }
}

impl<C: Clock + 'static> Drop for FeedRuntime<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tapgrid_core::{Price, PriceSample, SystemClock};

    use crate::buffer::PriceBufferConfig;

    fn fast_config() -> PriceBufferConfig {
        PriceBufferConfig {
            display_delay_ms: 100,
            retention_ms: 5_000,
            promotion_interval_ms: 10,
            frame_interval_ms: 10,
            stale_after_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_runtime_publishes_snapshots() {
        let buffer = Arc::new(PriceBuffer::new(fast_config(), SystemClock).unwrap());
        let runtime = FeedRuntime::new(Arc::clone(&buffer));

        let now = SystemClock.now_ms();
        buffer.ingest(PriceSample::new(now - 400, Price::new(dec!(100))));
        buffer.ingest(PriceSample::new(now - 200, Price::new(dec!(101))));

        runtime.start();
        assert!(runtime.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!buffer.curve().is_empty());
        runtime.stop();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let buffer = Arc::new(PriceBuffer::new(fast_config(), SystemClock).unwrap());
        let runtime = FeedRuntime::new(buffer);

        runtime.start();
        runtime.start();
        assert!(runtime.is_running());

        runtime.stop();
        runtime.stop();
        assert!(!runtime.is_running());

        // Restart works after a full stop.
        runtime.start();
        assert!(runtime.is_running());
        runtime.stop();
    }
}
