//! Delayed-buffer price interpolation pipeline.
//!
//! Sparse live ticks go into a raw arrival buffer; a periodic promotion
//! step moves everything older than the display delay into the display
//! buffer; a ~60 Hz loop recomputes a smooth interpolated curve over the
//! delayed window. The delay guarantees every rendered frame is bracketed
//! by real samples, so late ticks never cause visible jumps.

pub mod buffer;
pub mod error;
pub mod interpolator;
pub mod runtime;

pub use buffer::{PriceBuffer, PriceBufferConfig};
pub use error::{FeedError, FeedResult};
pub use runtime::FeedRuntime;
