//! Core domain types for the tapgrid trading client.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`: precision-safe decimal price type
//! - `CellId`, `CellBounds`, `GridConfig`: grid coordinate contract
//! - `GridSession`: session-scoped grid configuration
//! - `GridOrder`, `OrderStatus`: order lifecycle types
//! - `PriceSample`, `InterpolatedFrame`, `DisplayCurve`: feed types
//! - `Clock`: time source abstraction for testability

pub mod clock;
pub mod decimal;
pub mod error;
pub mod grid;
pub mod order;
pub mod session;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use grid::{CellBounds, CellId, GridConfig, PriceStep};
pub use order::{GridOrder, OrderId, OrderStatus};
pub use session::{GridSession, GridSessionRequest, SessionId};
pub use types::{DisplayCurve, InterpolatedFrame, PriceSample};
