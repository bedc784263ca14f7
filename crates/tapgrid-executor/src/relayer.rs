//! Relayer seam.
//!
//! The remote relayer accepts signed payloads and is the authoritative
//! nonce source: the client queries it, never computes nonces locally.
//! The trait keeps transport dyn-compatible for testing; the HTTP
//! implementation is the production transport.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tapgrid_keys::SessionKeyBundle;

use crate::payload::OrderPayload;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Transport-level relayer failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayerError {
    /// Network loss or timeout. Non-fatal: pending orders stay pending.
    #[error("relayer unreachable: {0}")]
    Unavailable(String),

    /// The relayer answered with something the client cannot interpret.
    #[error("relayer protocol error: {0}")]
    Protocol(String),
}

/// A fully signed order ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct SignedOrderRequest {
    /// Client order id, echoed back in confirmations.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Trader address, lowercase hex.
    pub trader: String,
    /// Canonical payload the signature covers.
    pub payload: OrderPayload,
    /// Nonce embedded in the payload, duplicated for indexing.
    pub nonce: u64,
    /// 65-byte signature over the payload hash, hex with 0x prefix.
    pub signature: String,
    /// Delegation bundle when signed by a session key.
    #[serde(rename = "sessionKey", skip_serializing_if = "Option::is_none")]
    pub session_key: Option<SessionKeyBundle>,
}

/// Result of a submission the relayer actually processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Order accepted and queued for execution.
    Accepted {
        /// Relayer-assigned order id.
        relayer_order_id: String,
    },
    /// The embedded nonce is behind the authoritative counter.
    StaleNonce {
        /// The counter value the relayer expected.
        expected: u64,
    },
    /// Rejected outright (bad signature, unknown symbol, ...).
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

/// Remote relayer capability.
pub trait Relayer: Send + Sync {
    /// Authoritative current nonce for a trader.
    fn current_nonce(&self, trader: &str) -> BoxFuture<'_, Result<u64, RelayerError>>;

    /// Submit a signed order.
    fn submit(&self, request: SignedOrderRequest)
        -> BoxFuture<'_, Result<SubmitOutcome, RelayerError>>;

    /// Propagate a local cancellation upstream.
    fn notify_cancelled(&self, order_id: &str) -> BoxFuture<'_, Result<(), RelayerError>>;
}

/// Arc wrapper for Relayer trait objects.
pub type DynRelayer = Arc<dyn Relayer>;

// ============================================================================
// Mock relayer
// ============================================================================

/// In-memory relayer for tests.
///
/// Keeps a per-trader authoritative counter: a submission whose nonce
/// matches the counter is accepted and advances it; a lower nonce is
/// answered with `StaleNonce`, mirroring the settlement rule that two
/// orders signed against one nonce are mutually exclusive.
#[derive(Default)]
pub struct MockRelayer {
    counters: DashMap<String, u64>,
    submissions: Mutex<Vec<SignedOrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    unavailable: std::sync::atomic::AtomicBool,
    forced_outcome: Mutex<Option<SubmitOutcome>>,
}

impl MockRelayer {
    /// Create a mock relayer with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a trader's authoritative counter.
    pub fn set_nonce(&self, trader: &str, nonce: u64) {
        self.counters.insert(trader.to_string(), nonce);
    }

    /// Simulate network loss for every call.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    /// Force the next submission outcome regardless of nonces.
    pub fn force_next_outcome(&self, outcome: SubmitOutcome) {
        *self.forced_outcome.lock() = Some(outcome);
    }

    /// Recorded submissions.
    #[must_use]
    pub fn submissions(&self) -> Vec<SignedOrderRequest> {
        self.submissions.lock().clone()
    }

    /// Recorded upstream cancellations.
    #[must_use]
    pub fn cancellations(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    fn check_available(&self) -> Result<(), RelayerError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            Err(RelayerError::Unavailable("mock offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Relayer for MockRelayer {
    fn current_nonce(&self, trader: &str) -> BoxFuture<'_, Result<u64, RelayerError>> {
        let trader = trader.to_string();
        Box::pin(async move {
            self.check_available()?;
            Ok(*self.counters.entry(trader).or_insert(0))
        })
    }

    fn submit(
        &self,
        request: SignedOrderRequest,
    ) -> BoxFuture<'_, Result<SubmitOutcome, RelayerError>> {
        Box::pin(async move {
            self.check_available()?;
            self.submissions.lock().push(request.clone());

            if let Some(outcome) = self.forced_outcome.lock().take() {
                return Ok(outcome);
            }

            let mut counter = self.counters.entry(request.trader.clone()).or_insert(0);
            if request.nonce == *counter {
                *counter += 1;
                Ok(SubmitOutcome::Accepted {
                    relayer_order_id: format!("rly_{}", request.order_id),
                })
            } else if request.nonce < *counter {
                Ok(SubmitOutcome::StaleNonce { expected: *counter })
            } else {
                Ok(SubmitOutcome::Rejected {
                    reason: format!("nonce {} ahead of counter {}", request.nonce, *counter),
                })
            }
        })
    }

    fn notify_cancelled(&self, order_id: &str) -> BoxFuture<'_, Result<(), RelayerError>> {
        let order_id = order_id.to_string();
        Box::pin(async move {
            self.check_available()?;
            self.cancelled.lock().push(order_id);
            Ok(())
        })
    }
}

// ============================================================================
// HTTP relayer
// ============================================================================

/// Default timeout for relayer requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    accepted: bool,
    #[serde(rename = "orderId")]
    order_id: Option<String>,
    #[serde(rename = "expectedNonce")]
    expected_nonce: Option<u64>,
    error: Option<String>,
}

/// HTTP transport to the production relayer.
pub struct HttpRelayer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelayer {
    /// Create a relayer client for the given base URL.
    ///
    /// # Errors
    /// Returns `RelayerError::Protocol` when the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: &str) -> Result<Self, RelayerError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RelayerError::Protocol(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Relayer for HttpRelayer {
    fn current_nonce(&self, trader: &str) -> BoxFuture<'_, Result<u64, RelayerError>> {
        let url = format!("{}/nonce/{}", self.base_url, trader);
        Box::pin(async move {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| RelayerError::Unavailable(e.to_string()))?;
            let body: NonceResponse = response
                .json()
                .await
                .map_err(|e| RelayerError::Protocol(e.to_string()))?;
            debug!(nonce = body.nonce, "fetched authoritative nonce");
            Ok(body.nonce)
        })
    }

    fn submit(
        &self,
        request: SignedOrderRequest,
    ) -> BoxFuture<'_, Result<SubmitOutcome, RelayerError>> {
        let url = format!("{}/orders", self.base_url);
        Box::pin(async move {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| RelayerError::Unavailable(e.to_string()))?;
            let body: SubmitResponse = response
                .json()
                .await
                .map_err(|e| RelayerError::Protocol(e.to_string()))?;

            if body.accepted {
                let relayer_order_id = body
                    .order_id
                    .ok_or_else(|| RelayerError::Protocol("accepted without orderId".into()))?;
                return Ok(SubmitOutcome::Accepted { relayer_order_id });
            }
            if let Some(expected) = body.expected_nonce {
                return Ok(SubmitOutcome::StaleNonce { expected });
            }
            Ok(SubmitOutcome::Rejected {
                reason: body.error.unwrap_or_else(|| "unspecified".to_string()),
            })
        })
    }

    fn notify_cancelled(&self, order_id: &str) -> BoxFuture<'_, Result<(), RelayerError>> {
        let url = format!("{}/orders/{}/cancel", self.base_url, order_id);
        Box::pin(async move {
            self.client
                .post(&url)
                .send()
                .await
                .map_err(|e| RelayerError::Unavailable(e.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;

    fn request(nonce: u64) -> SignedOrderRequest {
        SignedOrderRequest {
            order_id: format!("grid_test_{nonce}"),
            trader: format!("{:#x}", Address::ZERO),
            payload: OrderPayload::new(Address::ZERO, "BTC-USD", true, dec!(25), 10, nonce),
            nonce,
            signature: "0xdeadbeef".to_string(),
            session_key: None,
        }
    }

    #[tokio::test]
    async fn test_mock_accepts_matching_nonce_and_advances() {
        let relayer = MockRelayer::new();
        let trader = format!("{:#x}", Address::ZERO);

        assert_eq!(relayer.current_nonce(&trader).await.unwrap(), 0);
        let outcome = relayer.submit(request(0)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        assert_eq!(relayer.current_nonce(&trader).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mock_flags_stale_nonce() {
        let relayer = MockRelayer::new();
        let trader = format!("{:#x}", Address::ZERO);
        relayer.set_nonce(&trader, 6);

        let outcome = relayer.submit(request(5)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::StaleNonce { expected: 6 });
    }

    #[tokio::test]
    async fn test_mock_unavailable_errors_every_call() {
        let relayer = MockRelayer::new();
        relayer.set_unavailable(true);

        let trader = format!("{:#x}", Address::ZERO);
        assert!(matches!(
            relayer.current_nonce(&trader).await,
            Err(RelayerError::Unavailable(_))
        ));
        assert!(matches!(
            relayer.submit(request(0)).await,
            Err(RelayerError::Unavailable(_))
        ));

        relayer.set_unavailable(false);
        assert!(relayer.current_nonce(&trader).await.is_ok());
    }

    #[test]
    fn test_signed_request_wire_shape() {
        let json = serde_json::to_string(&request(3)).unwrap();
        assert!(json.contains("\"orderId\""));
        assert!(json.contains("\"nonce\":3"));
        // Absent session key is omitted from the wire entirely.
        assert!(!json.contains("sessionKey"));
    }
}
