//! Order lifecycle controller.
//!
//! Owns the order store, the per-cell order counts, and the per-order
//! re-sign episode flags. All state lives here behind explicit
//! accessors; nothing is module-global. The controller is the sole
//! writer of order state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::B256;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tapgrid_core::{CellId, Clock, GridOrder, GridSession, OrderId, OrderStatus, Price};
use tapgrid_grid::{payout_multiplier, GridCoordinateSystem};
use tapgrid_keys::{DynOwnerSigner, OwnerSigner, SessionKeyBundle, SessionKeyManager};

use crate::error::{ExecutorError, ExecutorResult};
use crate::nonce::NonceCoordinator;
use crate::payload::OrderPayload;
use crate::relayer::{DynRelayer, Relayer, RelayerError, SignedOrderRequest, SubmitOutcome};

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// A pending order with no relayer ack past this age is cancelled.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
}

fn default_submit_timeout_ms() -> u64 {
    10_000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: default_submit_timeout_ms(),
        }
    }
}

/// Result of a successful tap placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// Client order id.
    pub id: OrderId,
    /// Status immediately after placement.
    pub status: OrderStatus,
    /// Relayer-assigned id when the submission was acknowledged.
    /// `None` means the order is still "submitting".
    pub relayer_order_id: Option<String>,
    /// Display payout multiplier (x100) computed at placement.
    pub multiplier: u32,
}

/// Turns resolved cells into signed orders and repairs stale ones.
pub struct OrderLifecycleController<C: Clock> {
    session: GridSession,
    trader_hex: String,
    coords: GridCoordinateSystem,
    relayer: DynRelayer,
    owner: DynOwnerSigner,
    session_key: RwLock<Option<Arc<SessionKeyManager<C>>>>,
    nonce: NonceCoordinator,
    orders: DashMap<OrderId, GridOrder>,
    relayer_acks: DashMap<OrderId, String>,
    cell_counts: DashMap<CellId, u32>,
    resign_attempted: DashMap<OrderId, ()>,
    active: AtomicBool,
    config: ControllerConfig,
    clock: C,
}

impl<C: Clock> OrderLifecycleController<C> {
    /// Create a controller for one active grid session.
    #[must_use]
    pub fn new(
        session: GridSession,
        coords: GridCoordinateSystem,
        relayer: DynRelayer,
        owner: DynOwnerSigner,
        config: ControllerConfig,
        clock: C,
    ) -> Self {
        Self {
            trader_hex: format!("{:#x}", session.trader),
            session,
            coords,
            relayer,
            owner,
            session_key: RwLock::new(None),
            nonce: NonceCoordinator::new(),
            orders: DashMap::new(),
            relayer_acks: DashMap::new(),
            cell_counts: DashMap::new(),
            resign_attempted: DashMap::new(),
            active: AtomicBool::new(true),
            config,
            clock,
        }
    }

    /// Attach a session key for signature-less repeated taps.
    pub fn set_session_key(&self, manager: Arc<SessionKeyManager<C>>) {
        *self.session_key.write() = Some(manager);
    }

    /// Detach the session key; subsequent orders prompt the owner.
    pub fn clear_session_key(&self) {
        *self.session_key.write() = None;
    }

    /// Stop accepting taps. Idempotent from any state.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!(session = %self.session.id, "tap-to-trade deactivated");
        }
    }

    /// Whether taps are currently accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The session this controller serves.
    #[must_use]
    pub fn session(&self) -> &GridSession {
        &self.session
    }

    /// Turn a tap into exactly one signed order.
    ///
    /// The tap is validated locally first (no network call on
    /// rejection). The nonce fetch, signing, and submission run under
    /// the trader's single-flight permit: concurrent taps queue.
    ///
    /// # Errors
    /// - `Validation` for unplayable columns
    /// - `SigningRejected` when the owner declines (no order created)
    /// - `RelayerUnavailable` when the nonce fetch fails (no order yet)
    pub async fn place_order(
        &self,
        tap_time_ms: u64,
        tap_price: Price,
        reference_price: Price,
    ) -> ExecutorResult<PlacedOrder> {
        if !self.is_active() {
            return Err(ExecutorError::SessionInactive(self.session.id.to_string()));
        }

        let now = self.clock.now_ms();
        let cell = self.coords.resolve_tap(tap_time_ms, tap_price, now)?;
        let bounds = self.coords.cell_bounds(cell)?;

        let trigger_price = bounds.price_mid();
        let is_long = trigger_price > reference_price;
        let multiplier = payout_multiplier(reference_price, trigger_price, now, bounds.time_end_ms);

        // Single-flight: one nonce read-modify-sign-submit per trader.
        let _permit = self.nonce.acquire(&self.trader_hex).await;

        let nonce = self.relayer.current_nonce(&self.trader_hex).await?;
        let payload = OrderPayload::new(
            self.session.trader,
            &self.session.symbol,
            is_long,
            self.session.collateral_per_order(),
            self.session.leverage,
            nonce,
        );
        let hash = payload.hash()?;
        let (signature, session_key) = self.sign_payload(hash).await?;

        let now = self.clock.now_ms();
        let order = GridOrder {
            id: OrderId::new(now),
            grid_session_id: self.session.id.clone(),
            cell,
            trader: self.session.trader,
            symbol: self.session.symbol.clone(),
            is_long,
            collateral: self.session.collateral_per_order(),
            leverage: self.session.leverage,
            trigger_price,
            start_time_ms: bounds.time_start_ms,
            end_time_ms: bounds.time_end_ms,
            nonce,
            signature: Some(signature.clone()),
            status: OrderStatus::Pending,
            created_at_ms: now,
            updated_at_ms: now,
        };
        let id = order.id.clone();

        // Repeated taps accumulate independent orders, never merge.
        self.orders.insert(id.clone(), order);
        *self.cell_counts.entry(cell).or_insert(0) += 1;
        self.nonce.record_submitted(&self.trader_hex, nonce);

        let request = SignedOrderRequest {
            order_id: id.to_string(),
            trader: self.trader_hex.clone(),
            payload,
            nonce,
            signature,
            session_key,
        };

        let status = match self.relayer.submit(request).await {
            Ok(SubmitOutcome::Accepted { relayer_order_id }) => {
                debug!(order = %id, nonce, %relayer_order_id, "order accepted");
                self.relayer_acks.insert(id.clone(), relayer_order_id);
                OrderStatus::Pending
            }
            Ok(SubmitOutcome::StaleNonce { expected }) => {
                warn!(order = %id, nonce, expected, "stale nonce at submission");
                self.mark_needs_resign(&id)?;
                OrderStatus::NeedsResign
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                self.finalize(&id, OrderStatus::Cancelled)?;
                return Err(ExecutorError::Rejected(reason));
            }
            Err(RelayerError::Unavailable(msg)) => {
                // Order stays PENDING, surfaced as "submitting".
                warn!(order = %id, error = %msg, "relayer unreachable, order pending");
                OrderStatus::Pending
            }
            Err(e) => {
                self.finalize(&id, OrderStatus::Cancelled)?;
                return Err(e.into());
            }
        };

        Ok(PlacedOrder {
            relayer_order_id: self.relayer_acks.get(&id).map(|r| r.clone()),
            id,
            status,
            multiplier,
        })
    }

    /// Handle a remote execution confirmation. Idempotent.
    ///
    /// Also detects staleness: any *other* pending order of this trader
    /// whose nonce is at or below the executed nonce can no longer
    /// settle and transitions to NEEDS_RESIGN (exactly once).
    ///
    /// # Errors
    /// `UnknownOrder` for ids this controller never issued.
    pub fn on_order_executed(&self, id: &OrderId) -> ExecutorResult<()> {
        let executed_nonce = {
            let mut order = self
                .orders
                .get_mut(id)
                .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
            if order.status == OrderStatus::Executed {
                return Ok(()); // duplicate confirmation
            }
            order.transition(OrderStatus::Executed, self.clock.now_ms())?;
            order.nonce
        };
        self.release_cell(id);
        info!(order = %id, nonce = executed_nonce, "order executed");

        let stale_ids: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|entry| {
                entry.key() != id
                    && entry.value().status == OrderStatus::Pending
                    && entry.value().nonce <= executed_nonce
            })
            .map(|entry| entry.key().clone())
            .collect();

        for stale_id in stale_ids {
            self.mark_needs_resign(&stale_id)?;
        }
        Ok(())
    }

    /// Attempt to repair one NEEDS_RESIGN order.
    ///
    /// At most one attempt per staleness episode: a second call inside
    /// the same episode returns `Ok(None)`. The episode flag clears on
    /// success, on a fresh staleness detection, and on an unreachable
    /// relayer (skip, retry next cycle).
    ///
    /// # Errors
    /// `UnknownOrder` for foreign ids; signing failures other than
    /// rejection propagate.
    pub async fn try_resign(&self, id: &OrderId) -> ExecutorResult<Option<OrderStatus>> {
        {
            let order = self
                .orders
                .get(id)
                .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
            if order.status != OrderStatus::NeedsResign {
                return Ok(None);
            }
        }
        if self.resign_attempted.insert(id.clone(), ()).is_some() {
            return Ok(None); // already attempted this episode
        }

        let _permit = self.nonce.acquire(&self.trader_hex).await;

        // Always a fresh authoritative nonce, never the cached one.
        let nonce = match self.relayer.current_nonce(&self.trader_hex).await {
            Ok(n) => n,
            Err(RelayerError::Unavailable(msg)) => {
                debug!(order = %id, error = %msg, "re-sign skipped, relayer unreachable");
                self.resign_attempted.remove(id);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let (is_long, cell) = {
            let order = self
                .orders
                .get(id)
                .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
            (order.is_long, order.cell)
        };
        let payload = OrderPayload::new(
            self.session.trader,
            &self.session.symbol,
            is_long,
            self.session.collateral_per_order(),
            self.session.leverage,
            nonce,
        );
        let hash = payload.hash()?;

        let (signature, session_key) = match self.sign_payload(hash).await {
            Ok(signed) => signed,
            Err(ExecutorError::SigningRejected) => {
                // Explicit rejection: cancelled locally and upstream.
                info!(order = %id, "re-sign declined, cancelling");
                self.finalize(id, OrderStatus::Cancelled)?;
                if let Err(e) = self.relayer.notify_cancelled(id.as_str()).await {
                    warn!(order = %id, error = %e, "upstream cancel notification failed");
                }
                return Ok(Some(OrderStatus::Cancelled));
            }
            Err(e) => return Err(e),
        };

        let request = SignedOrderRequest {
            order_id: id.to_string(),
            trader: self.trader_hex.clone(),
            payload,
            nonce,
            signature: signature.clone(),
            session_key,
        };

        match self.relayer.submit(request).await {
            Ok(SubmitOutcome::Accepted { relayer_order_id }) => {
                let now = self.clock.now_ms();
                let mut order = self
                    .orders
                    .get_mut(id)
                    .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
                order.nonce = nonce;
                order.signature = Some(signature);
                order.transition(OrderStatus::Pending, now)?;
                drop(order);

                self.relayer_acks.insert(id.clone(), relayer_order_id);
                self.nonce.record_submitted(&self.trader_hex, nonce);
                self.resign_attempted.remove(id); // cleared on success
                info!(order = %id, nonce, "order re-signed");
                Ok(Some(OrderStatus::Pending))
            }
            Ok(SubmitOutcome::StaleNonce { expected }) => {
                // A new staleness episode: eligible again next cycle.
                warn!(order = %id, nonce, expected, "nonce stale again during re-sign");
                self.resign_attempted.remove(id);
                Ok(Some(OrderStatus::NeedsResign))
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                warn!(order = %id, reason = %reason, "re-sign rejected, cancelling");
                self.finalize(id, OrderStatus::Cancelled)?;
                Ok(Some(OrderStatus::Cancelled))
            }
            Err(RelayerError::Unavailable(msg)) => {
                debug!(order = %id, error = %msg, "re-sign submit skipped, retry next cycle");
                self.resign_attempted.remove(id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel an order locally and upstream.
    ///
    /// # Errors
    /// `UnknownOrder` or an illegal transition (already terminal).
    pub async fn cancel_order(&self, id: &OrderId) -> ExecutorResult<()> {
        self.finalize(id, OrderStatus::Cancelled)?;
        if let Err(e) = self.relayer.notify_cancelled(id.as_str()).await {
            warn!(order = %id, error = %e, "upstream cancel notification failed");
        }
        Ok(())
    }

    /// Cancel pending orders that never got a relayer ack within the
    /// submit timeout. Returns the cancelled ids.
    pub fn sweep_submit_timeouts(&self) -> Vec<OrderId> {
        let now = self.clock.now_ms();
        let overdue: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|entry| {
                entry.value().status == OrderStatus::Pending
                    && !self.relayer_acks.contains_key(entry.key())
                    && now.saturating_sub(entry.value().updated_at_ms)
                        > self.config.submit_timeout_ms
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut cancelled = Vec::new();
        for id in overdue {
            match self.finalize(&id, OrderStatus::Cancelled) {
                Ok(()) => {
                    warn!(order = %id, "submit timed out, cancelled locally");
                    cancelled.push(id);
                }
                Err(e) => debug!(order = %id, error = %e, "timeout sweep skipped order"),
            }
        }
        cancelled
    }

    /// Ids currently awaiting re-sign.
    #[must_use]
    pub fn orders_needing_resign(&self) -> Vec<OrderId> {
        self.orders
            .iter()
            .filter(|entry| entry.value().status == OrderStatus::NeedsResign)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot of one order.
    #[must_use]
    pub fn order(&self, id: &OrderId) -> Option<GridOrder> {
        self.orders.get(id).map(|o| o.clone())
    }

    /// Number of live (non-terminal) orders stacked on a cell.
    #[must_use]
    pub fn orders_in_cell(&self, cell: CellId) -> u32 {
        self.cell_counts.get(&cell).map(|c| *c).unwrap_or(0)
    }

    /// Number of non-terminal orders in the store.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|entry| !entry.value().status.is_terminal())
            .count()
    }

    /// Sign a payload hash: session key when valid, else owner prompt.
    async fn sign_payload(
        &self,
        hash: B256,
    ) -> ExecutorResult<(String, Option<SessionKeyBundle>)> {
        // Clone the Arc out so no lock is held across the await.
        let manager = self.session_key.read().clone();
        if let Some(manager) = manager {
            if let Some(sig) = manager.sign_with_session(hash).await {
                let bundle = manager.key().to_wire();
                return Ok((format!("0x{}", hex::encode(sig.as_bytes())), Some(bundle)));
            }
        }

        let sig = self.owner.sign_hash(hash).await?;
        Ok((format!("0x{}", hex::encode(sig.as_bytes())), None))
    }

    /// Transition into NEEDS_RESIGN, opening a fresh re-sign episode.
    fn mark_needs_resign(&self, id: &OrderId) -> ExecutorResult<()> {
        let mut order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
        order.transition(OrderStatus::NeedsResign, self.clock.now_ms())?;
        drop(order);
        self.relayer_acks.remove(id);
        self.resign_attempted.remove(id);
        Ok(())
    }

    /// Move an order to a terminal state and release its cell slot.
    fn finalize(&self, id: &OrderId, status: OrderStatus) -> ExecutorResult<()> {
        let mut order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| ExecutorError::UnknownOrder(id.to_string()))?;
        order.transition(status, self.clock.now_ms())?;
        drop(order);
        self.release_cell(id);
        Ok(())
    }

    /// Decrement the cell count for a finished order.
    fn release_cell(&self, id: &OrderId) {
        if let Some(order) = self.orders.get(id) {
            if let Some(mut count) = self.cell_counts.get_mut(&order.cell) {
                *count = count.saturating_sub(1);
            }
        }
    }
}
