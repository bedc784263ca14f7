//! Tap-to-trade client application.
//!
//! Wires the feed pipeline, coordinate system, session keys, and order
//! lifecycle into one process: configuration, startup, the main event
//! loop, and idempotent shutdown.

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, TapEvent};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
