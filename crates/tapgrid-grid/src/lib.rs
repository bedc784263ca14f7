//! Grid coordinate system, view transform, and payout odds.
//!
//! The coordinate contract is the part of the client that money settles
//! on: a tapped (timestamp, price) pair must resolve to the same cell on
//! the client and the settlement backend, to the cent and millisecond.

pub mod coords;
pub mod error;
pub mod odds;
pub mod view;

pub use coords::GridCoordinateSystem;
pub use error::{GridError, GridResult};
pub use odds::{payout_multiplier, MAX_MULTIPLIER, MIN_MULTIPLIER};
pub use view::ViewTransform;
