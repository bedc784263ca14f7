//! Application wiring and main event loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use tapgrid_core::{GridSessionRequest, Price, PriceSample, SystemClock};
use tapgrid_executor::{
    DynRelayer, ExecutorError, GridSessionService, HttpGridSessionService, HttpRelayer,
    OrderLifecycleController, ResignPoller,
};
use tapgrid_feed::{FeedRuntime, PriceBuffer};
use tapgrid_grid::GridCoordinateSystem;
use tapgrid_keys::{DynOwnerSigner, KeyManager, LocalOwnerSigner, SessionKeyManager};
use tapgrid_telemetry::Metrics;

use crate::config::AppConfig;
use crate::error::AppResult;

/// A tap already translated to data coordinates by the renderer.
#[derive(Debug, Clone, Copy)]
pub struct TapEvent {
    /// Tapped time in milliseconds since Unix epoch.
    pub time_ms: u64,
    /// Tapped price.
    pub price: Price,
}

/// The assembled tap-to-trade client.
pub struct Application {
    config: AppConfig,
    key_manager: KeyManager,
}

impl Application {
    /// Load keys and validate configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let key_manager = KeyManager::load(config.key.source()?, config.key.expected_address)?;
        info!(owner = %key_manager.owner_address(), "owner key loaded");
        Ok(Self {
            config,
            key_manager,
        })
    }

    /// Create the session, start all loops, and run until shutdown.
    ///
    /// Shutdown paths (all idempotent): ctrl-c, session-key expiry, or
    /// both channels closing. Session-key expiry deactivates the
    /// tap-to-trade mode outright rather than falling back to per-tap
    /// prompting.
    pub async fn run(
        &self,
        mut tick_rx: mpsc::Receiver<PriceSample>,
        mut tap_rx: mpsc::Receiver<TapEvent>,
    ) -> AppResult<()> {
        let config = &self.config;

        // Grid session: the service assigns and owns the anchors.
        let session_service = HttpGridSessionService::new(&config.session_service_url)?;
        let session = session_service
            .create_session(GridSessionRequest {
                trader: self.key_manager.owner_address(),
                symbol: config.symbol.clone(),
                margin_total: config.margin_total,
                leverage: config.leverage,
                time_step_secs: config.grid.time_step_secs,
                column_candle_span: config.grid.column_candle_span,
                price_step: config.grid.price_step()?,
            })
            .await?;
        info!(
            id = %session.id,
            price_step = %session.price_step,
            anchor_price = %session.anchor_price,
            "grid session created"
        );

        // Feed pipeline.
        let buffer = Arc::new(PriceBuffer::new(config.feed, SystemClock)?);
        let feed = FeedRuntime::new(Arc::clone(&buffer));
        feed.start();

        // Session key: abort startup entirely if the self-check fails.
        let owner: DynOwnerSigner = Arc::new(LocalOwnerSigner::new(
            self.key_manager.owner_signer().clone(),
        ));
        let session_key = Arc::new(
            SessionKeyManager::create(
                owner.as_ref(),
                config.session_key_duration_ms,
                SystemClock,
            )
            .await?,
        );
        let mut expiry_rx = session_key.subscribe_expiry();
        session_key.start_expiry_watch();

        // Order lifecycle.
        let relayer: DynRelayer = Arc::new(HttpRelayer::new(&config.relayer_url)?);
        let coords = GridCoordinateSystem::with_min_lead(
            session.grid_config(),
            config.grid.min_lead_ms,
        );
        let controller = Arc::new(OrderLifecycleController::new(
            session.clone(),
            coords,
            relayer,
            owner,
            config.controller,
            SystemClock,
        ));
        controller.set_session_key(Arc::clone(&session_key));

        let poller = ResignPoller::new(Arc::clone(&controller), config.resign);
        poller.start();

        info!("entering main event loop");
        loop {
            tokio::select! {
                Some(sample) = tick_rx.recv() => {
                    buffer.ingest(sample);
                    Metrics::tick_ingested();
                    Metrics::set_feed_stale(buffer.is_stale());
                }

                Some(tap) = tap_rx.recv() => {
                    self.handle_tap(&controller, &buffer, tap).await;
                }

                _ = expiry_rx.changed() => {
                    warn!("session key expired, deactivating tap-to-trade");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        // Teardown, safe from any state.
        controller.deactivate();
        poller.stop();
        feed.stop();
        session_key.stop_expiry_watch();
        if let Err(e) = session_service.cancel_session(&session.id).await {
            warn!(error = %e, "session cancellation failed");
        }
        info!("shutdown complete");
        Ok(())
    }

    /// Resolve one tap into one order, recording the outcome.
    async fn handle_tap(
        &self,
        controller: &OrderLifecycleController<SystemClock>,
        buffer: &PriceBuffer<SystemClock>,
        tap: TapEvent,
    ) {
        let curve = buffer.curve();
        let Some(reference) = curve.latest().map(|f| f.price) else {
            warn!("tap ignored: no display curve yet");
            Metrics::tap("rejected");
            return;
        };

        match controller.place_order(tap.time_ms, tap.price, reference).await {
            Ok(placed) => {
                info!(
                    order = %placed.id,
                    status = %placed.status,
                    multiplier = placed.multiplier,
                    "tap placed"
                );
                Metrics::tap("placed");
                Metrics::order_status(&placed.status.to_string());
            }
            Err(ExecutorError::Validation(e)) => {
                info!(error = %e, "tap outside playable window");
                Metrics::tap("unplayable");
            }
            Err(ExecutorError::SigningRejected) => {
                info!("tap declined at signing prompt");
                Metrics::tap("declined");
            }
            Err(e) => {
                error!(error = %e, "tap failed");
                Metrics::tap("rejected");
            }
        }
    }
}
