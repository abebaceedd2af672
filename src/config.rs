//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for sensitive values like `BROKER_API_KEY`. Missing required
//! options fail at startup; there is no partial-start mode.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Market feed connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Websocket endpoint of the market feed. Required.
    pub url: String,
    /// Initial delay before the first reconnection attempt (milliseconds).
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,
    /// Interval between outbound ping frames (seconds).
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Whether a book frame with only one populated side still yields a price.
    #[serde(default = "default_allow_one_sided_books")]
    pub allow_one_sided_books: bool,
}

fn default_reconnect_initial_ms() -> u64 {
    1000 // 1 second
}

fn default_reconnect_max_ms() -> u64 {
    60000 // 60 seconds
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_allow_one_sided_books() -> bool {
    true
}

impl FeedConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// Broker REST settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the broker API. Required for `run`.
    pub api_url: String,
    /// API key; the `BROKER_API_KEY` environment variable overrides this.
    #[serde(default)]
    pub api_key: String,
    /// Per-call timeout (seconds).
    #[serde(default = "default_broker_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_broker_timeout_secs() -> u64 {
    30
}

impl BrokerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rule store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Number of event rows kept for dashboard reads.
    #[serde(default = "default_event_retention")]
    pub event_retention: u32,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("tripwire").join("tripwire.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "tripwire.db".to_string())
}

fn default_event_retention() -> u32 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            event_retention: default_event_retention(),
        }
    }
}

/// Worker loop cadences.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Interval between subscription reconciliations (seconds).
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Interval between broker position refreshes (seconds).
    #[serde(default = "default_position_refresh_interval_secs")]
    pub position_refresh_interval_secs: u64,
    /// Minimum gap between RULE_EVALUATED events for one rule (seconds).
    #[serde(default = "default_evaluation_event_secs")]
    pub evaluation_event_secs: u64,
}

fn default_reconcile_interval_secs() -> u64 {
    5
}

fn default_position_refresh_interval_secs() -> u64 {
    30
}

fn default_evaluation_event_secs() -> u64 {
    10
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            position_refresh_interval_secs: default_position_refresh_interval_secs(),
            evaluation_event_secs: default_evaluation_event_secs(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    #[must_use]
    pub fn position_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.position_refresh_interval_secs)
    }

    #[must_use]
    pub fn evaluation_event_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_event_secs)
    }
}

/// Order placement settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Slippage allowance below the current price for stop-loss and
    /// trailing-stop limit orders.
    #[serde(default = "default_slippage_stop_loss")]
    pub slippage_stop_loss: Decimal,
    /// Slippage allowance below the current price for take-profit limit orders.
    #[serde(default = "default_slippage_take_profit")]
    pub slippage_take_profit: Decimal,
}

fn default_slippage_stop_loss() -> Decimal {
    Decimal::new(2, 2) // 2%
}

fn default_slippage_take_profit() -> Decimal {
    Decimal::new(1, 2) // 1%
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_stop_loss: default_slippage_stop_loss(),
            slippage_take_profit: default_slippage_take_profit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    /// Returns a configuration error when the file is unreadable, the TOML
    /// is malformed, or a required option is missing or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::parse_toml(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without validation.
    ///
    /// # Errors
    /// Returns a configuration error for malformed TOML.
    pub fn parse_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("BROKER_API_KEY") {
            if !key.trim().is_empty() {
                self.broker.api_key = key;
            }
        }
    }

    /// Validate required options. Fails fast; there is no partial-start mode.
    ///
    /// # Errors
    /// Returns a configuration error naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            return Err(Error::Config("feed.url is required".into()));
        }
        let url = url::Url::parse(&self.feed.url)
            .map_err(|e| Error::Config(format!("feed.url is not a valid URL: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "feed.url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.broker.api_url.trim().is_empty() {
            return Err(Error::Config("broker.api_url is required".into()));
        }
        if self.feed.reconnect_multiplier < 1.0 {
            return Err(Error::Config(
                "feed.reconnect_multiplier must be >= 1".into(),
            ));
        }
        if self.feed.reconnect_initial_ms == 0 {
            return Err(Error::Config("feed.reconnect_initial_ms must be > 0".into()));
        }
        Ok(())
    }
}
