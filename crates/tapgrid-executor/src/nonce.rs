//! Per-trader nonce coordination.
//!
//! The relayer owns the counter; this module owns the discipline around
//! it. Two orders signed against the same nonce are mutually exclusive
//! at settlement, so every fetch-sign-submit chain runs under a
//! per-trader single-flight permit and concurrent taps queue instead of
//! racing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes nonce use per trader and records the last submitted nonce.
#[derive(Default)]
pub struct NonceCoordinator {
    permits: DashMap<String, Arc<Mutex<()>>>,
    last_submitted: DashMap<String, u64>,
}

impl NonceCoordinator {
    /// Create an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the single-flight permit for a trader.
    ///
    /// Held across the whole fetch-sign-submit chain; this is the one
    /// lock in the system deliberately held across an I/O wait.
    pub async fn acquire(&self, trader: &str) -> OwnedMutexGuard<()> {
        let permit = self
            .permits
            .entry(trader.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        permit.lock_owned().await
    }

    /// Record the nonce a submission actually carried.
    pub fn record_submitted(&self, trader: &str, nonce: u64) {
        self.last_submitted.insert(trader.to_string(), nonce);
    }

    /// Last nonce submitted for a trader, if any.
    #[must_use]
    pub fn last_submitted(&self, trader: &str) -> Option<u64> {
        self.last_submitted.get(trader).map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_permit_serializes_critical_sections() {
        let coordinator = Arc::new(NonceCoordinator::new());
        let in_flight = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            let in_flight = Arc::clone(&in_flight);
            handles.push(tokio::spawn(async move {
                let _permit = coordinator.acquire("0xabc").await;
                let concurrent = in_flight.fetch_add(1, Ordering::SeqCst);
                assert_eq!(concurrent, 0, "two chains entered the critical section");
                tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_distinct_traders_do_not_contend() {
        let coordinator = NonceCoordinator::new();
        let _a = coordinator.acquire("0xaaa").await;
        // Would deadlock if traders shared a permit.
        let _b = coordinator.acquire("0xbbb").await;
    }

    #[test]
    fn test_last_submitted_roundtrip() {
        let coordinator = NonceCoordinator::new();
        assert_eq!(coordinator.last_submitted("0xabc"), None);
        coordinator.record_submitted("0xabc", 5);
        assert_eq!(coordinator.last_submitted("0xabc"), Some(5));
    }
}
