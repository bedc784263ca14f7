//! Order lifecycle: tap to signed order to settlement.
//!
//! A resolved cell becomes a canonically hashed, nonce-sequenced, signed
//! order. The controller owns the order store and its state machine; the
//! nonce coordinator serializes every fetch-sign-submit chain per trader;
//! the re-sign poller repairs orders whose nonce went stale before
//! acceptance.

pub mod controller;
pub mod error;
pub mod nonce;
pub mod payload;
pub mod relayer;
pub mod resign;
pub mod session_service;

pub use controller::{ControllerConfig, OrderLifecycleController, PlacedOrder};
pub use error::{ExecutorError, ExecutorResult};
pub use nonce::NonceCoordinator;
pub use payload::OrderPayload;
pub use relayer::{
    DynRelayer, HttpRelayer, MockRelayer, Relayer, RelayerError, SignedOrderRequest, SubmitOutcome,
};
pub use resign::{ResignPoller, ResignPollerConfig};
pub use session_service::{
    DynGridSessionService, GridSessionService, HttpGridSessionService, MockGridSessionService,
    SessionServiceError,
};
