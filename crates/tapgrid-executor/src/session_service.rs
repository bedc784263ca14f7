//! Grid session service seam.
//!
//! The remote service is the single source of truth for session anchors:
//! the client sends geometry preferences, the service answers with the
//! anchors the session is locked to, and the client resolves the price
//! step against them exactly once.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use tapgrid_core::{Clock, CoreError, GridSession, GridSessionRequest, Price, SessionId};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Session service failures.
#[derive(Debug, Error)]
pub enum SessionServiceError {
    /// Network loss or timeout.
    #[error("session service unreachable: {0}")]
    Unavailable(String),

    /// Uninterpretable response.
    #[error("session service protocol error: {0}")]
    Protocol(String),

    /// The returned anchors produce an invalid geometry.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Remote grid session service capability.
pub trait GridSessionService: Send + Sync {
    /// Create a session; the service assigns id and anchors.
    fn create_session(
        &self,
        request: GridSessionRequest,
    ) -> BoxFuture<'_, Result<GridSession, SessionServiceError>>;

    /// Cancel a session.
    fn cancel_session(&self, id: &SessionId) -> BoxFuture<'_, Result<(), SessionServiceError>>;
}

/// Arc wrapper for GridSessionService trait objects.
pub type DynGridSessionService = Arc<dyn GridSessionService>;

// ============================================================================
// Mock session service
// ============================================================================

/// In-memory session service for tests.
pub struct MockGridSessionService<C: Clock> {
    anchor_price: Mutex<Price>,
    cancelled: Mutex<Vec<SessionId>>,
    clock: C,
}

impl<C: Clock> MockGridSessionService<C> {
    /// Create a mock that anchors sessions at the given price and the
    /// current clock time.
    #[must_use]
    pub fn new(anchor_price: Price, clock: C) -> Self {
        Self {
            anchor_price: Mutex::new(anchor_price),
            cancelled: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Change the anchor price assigned to future sessions.
    pub fn set_anchor_price(&self, price: Price) {
        *self.anchor_price.lock() = price;
    }

    /// Sessions cancelled through this service.
    #[must_use]
    pub fn cancellations(&self) -> Vec<SessionId> {
        self.cancelled.lock().clone()
    }
}

impl<C: Clock> GridSessionService for MockGridSessionService<C> {
    fn create_session(
        &self,
        request: GridSessionRequest,
    ) -> BoxFuture<'_, Result<GridSession, SessionServiceError>> {
        Box::pin(async move {
            let now = self.clock.now_ms();
            let session = GridSession::from_request(
                &request,
                SessionId::new(now),
                now,
                *self.anchor_price.lock(),
                now,
            )?;
            Ok(session)
        })
    }

    fn cancel_session(&self, id: &SessionId) -> BoxFuture<'_, Result<(), SessionServiceError>> {
        let id = id.clone();
        Box::pin(async move {
            self.cancelled.lock().push(id);
            Ok(())
        })
    }
}

// ============================================================================
// HTTP session service
// ============================================================================

/// Default timeout for session service requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    #[serde(rename = "anchorTime")]
    anchor_time_ms: u64,
    #[serde(rename = "anchorPrice")]
    anchor_price: Price,
    #[serde(rename = "createdAt")]
    created_at_ms: u64,
}

/// HTTP transport to the production session service.
pub struct HttpGridSessionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGridSessionService {
    /// Create a session service client for the given base URL.
    ///
    /// # Errors
    /// Returns `SessionServiceError::Protocol` when the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, SessionServiceError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SessionServiceError::Protocol(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl GridSessionService for HttpGridSessionService {
    fn create_session(
        &self,
        request: GridSessionRequest,
    ) -> BoxFuture<'_, Result<GridSession, SessionServiceError>> {
        let url = format!("{}/sessions", self.base_url);
        Box::pin(async move {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| SessionServiceError::Unavailable(e.to_string()))?;
            let body: CreateSessionResponse = response
                .json()
                .await
                .map_err(|e| SessionServiceError::Protocol(e.to_string()))?;

            let session = GridSession::from_request(
                &request,
                SessionId::from_string(body.id),
                body.anchor_time_ms,
                body.anchor_price,
                body.created_at_ms,
            )?;
            info!(id = %session.id, "grid session created");
            Ok(session)
        })
    }

    fn cancel_session(&self, id: &SessionId) -> BoxFuture<'_, Result<(), SessionServiceError>> {
        let url = format!("{}/sessions/{}/cancel", self.base_url, id);
        Box::pin(async move {
            self.client
                .post(&url)
                .send()
                .await
                .map_err(|e| SessionServiceError::Unavailable(e.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;
    use tapgrid_core::{PriceStep, SystemClock};

    fn request() -> GridSessionRequest {
        GridSessionRequest {
            trader: Address::ZERO,
            symbol: "BTC-USD".to_string(),
            margin_total: dec!(25),
            leverage: 10,
            time_step_secs: 10,
            column_candle_span: 4,
            price_step: PriceStep::Percent(dec!(0.02)),
        }
    }

    #[tokio::test]
    async fn test_mock_assigns_anchors_and_resolves_step() {
        let service = MockGridSessionService::new(Price::new(dec!(50000)), SystemClock);
        let session = service.create_session(request()).await.unwrap();

        assert_eq!(session.anchor_price, Price::new(dec!(50000)));
        assert_eq!(session.price_step, Price::new(dec!(10)));
        assert!(session.is_active);
    }

    #[tokio::test]
    async fn test_mock_records_cancellations() {
        let service = MockGridSessionService::new(Price::new(dec!(50000)), SystemClock);
        let session = service.create_session(request()).await.unwrap();

        service.cancel_session(&session.id).await.unwrap();
        assert_eq!(service.cancellations(), vec![session.id]);
    }
}
