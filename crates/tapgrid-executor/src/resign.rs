//! Re-sign poller.
//!
//! Periodic repair task for NEEDS_RESIGN orders. Runs independently of
//! new-order creation (disjoint order ids; the single-flight permit
//! serializes the nonce chains). Each order is attempted at most once
//! per staleness episode; an unreachable relayer skips the cycle and the
//! next one retries.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use tapgrid_core::Clock;

use crate::controller::OrderLifecycleController;

/// Poller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResignPollerConfig {
    /// Poll period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for ResignPollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Periodic task repairing stale-nonce orders.
///
/// `start`/`stop` are idempotent from any state.
pub struct ResignPoller<C: Clock + 'static> {
    controller: Arc<OrderLifecycleController<C>>,
    config: ResignPollerConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl<C: Clock + 'static> ResignPoller<C> {
    /// Create a poller for one controller.
    #[must_use]
    pub fn new(controller: Arc<OrderLifecycleController<C>>, config: ResignPollerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            controller,
            config,
            handle: Mutex::new(None),
            shutdown,
        }
    }

    /// Run one poll cycle: sweep submit timeouts, then attempt every
    /// order currently awaiting re-sign.
    ///
    /// Exposed for tests and for a final sweep during shutdown.
    pub async fn run_once(controller: &OrderLifecycleController<C>) {
        let timed_out = controller.sweep_submit_timeouts();
        if !timed_out.is_empty() {
            warn!(count = timed_out.len(), "cancelled timed-out submissions");
        }

        for id in controller.orders_needing_resign() {
            match controller.try_resign(&id).await {
                Ok(Some(status)) => debug!(order = %id, %status, "re-sign attempt finished"),
                Ok(None) => debug!(order = %id, "re-sign skipped"),
                Err(e) => warn!(order = %id, error = %e, "re-sign attempt failed"),
            }
        }
    }

    /// Spawn the poll loop. No-op when already running.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        let controller = Arc::clone(&self.controller);
        let period = Duration::from_millis(self.config.poll_interval_ms);
        let mut rx = self.shutdown.subscribe();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => Self::run_once(&controller).await,
                    _ = rx.changed() => break,
                }
            }
            debug!("re-sign poller stopped");
        }));

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "re-sign poller started"
        );
    }

    /// Stop the poll loop. Safe to call repeatedly and from any state.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = self.shutdown.send(true);
            handle.abort();
            info!("re-sign poller stopped");
        }
    }

    /// Whether the loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl<C: Clock + 'static> Drop for ResignPoller<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
