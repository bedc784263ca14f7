//! Application configuration.

use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tapgrid_core::{Price, PriceStep};
use tapgrid_executor::{ControllerConfig, ResignPollerConfig};
use tapgrid_feed::PriceBufferConfig;
use tapgrid_keys::KeySource;

use crate::error::{AppError, AppResult};

/// Owner key source configuration. Exactly one of the fields is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Environment variable holding the hex private key (development).
    #[serde(default)]
    pub env_var: Option<String>,
    /// File holding the hex private key (production, 0600 permissions).
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Expected owner address; startup fails on mismatch.
    #[serde(default)]
    pub expected_address: Option<Address>,
}

impl KeyConfig {
    /// Resolve to a key source.
    pub fn source(&self) -> AppResult<KeySource> {
        match (&self.env_var, &self.file) {
            (Some(var_name), None) => Ok(KeySource::EnvVar {
                var_name: var_name.clone(),
            }),
            (None, Some(path)) => Ok(KeySource::File { path: path.clone() }),
            _ => Err(AppError::Config(
                "exactly one of key.env_var or key.file must be set".into(),
            )),
        }
    }
}

/// Grid geometry preferences sent to the session service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Column width in seconds.
    #[serde(default = "default_time_step_secs")]
    pub time_step_secs: u64,
    /// Candles rendered per column.
    #[serde(default = "default_column_candle_span")]
    pub column_candle_span: u32,
    /// Price step as percent of the anchor price.
    #[serde(default)]
    pub price_step_percent: Option<Decimal>,
    /// Absolute price step; takes precedence over percent.
    #[serde(default)]
    pub price_step_absolute: Option<Decimal>,
    /// Minimum lead before a column's window opens.
    #[serde(default = "default_min_lead_ms")]
    pub min_lead_ms: u64,
}

fn default_time_step_secs() -> u64 {
    10
}

fn default_column_candle_span() -> u32 {
    4
}

fn default_min_lead_ms() -> u64 {
    1_500
}

impl GridSettings {
    /// Resolve the configured price step specification.
    pub fn price_step(&self) -> AppResult<PriceStep> {
        match (self.price_step_absolute, self.price_step_percent) {
            (Some(abs), _) => Ok(PriceStep::Absolute(Price::new(abs))),
            (None, Some(pct)) => Ok(PriceStep::Percent(pct)),
            (None, None) => Err(AppError::Config(
                "one of grid.price_step_absolute or grid.price_step_percent must be set".into(),
            )),
        }
    }
}

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relayer base URL.
    pub relayer_url: String,
    /// Grid session service base URL.
    pub session_service_url: String,
    /// Market symbol to trade.
    pub symbol: String,
    /// Total margin per session; every tap commits all of it.
    pub margin_total: Decimal,
    /// Leverage applied to each order.
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Session key lifetime in milliseconds.
    #[serde(default = "default_session_key_duration_ms")]
    pub session_key_duration_ms: u64,
    /// Owner key source.
    pub key: KeyConfig,
    /// Grid geometry preferences.
    pub grid: GridSettings,
    /// Feed buffer tuning.
    #[serde(default)]
    pub feed: PriceBufferConfig,
    /// Order controller tuning.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Re-sign poller tuning.
    #[serde(default)]
    pub resign: ResignPollerConfig,
}

fn default_leverage() -> u32 {
    10
}

fn default_session_key_duration_ms() -> u64 {
    3_600_000
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }
}
