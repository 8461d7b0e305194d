//! Configuration types for crossover-alert

use crate::alert::TelegramConfig;
use crate::indicators::IndicatorPeriods;
use crate::market::{validate_instrument, Timeframe};
use crate::signal::DetectorThresholds;
use crate::telemetry::LogFormat;
use crate::ws::{WsConfig, DEFAULT_APP_ID, DEFAULT_ENDPOINT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Built-in configuration used when no file is available
pub const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

const MASK: &str = "********";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Market-data provider connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// Consecutive transport failures before giving up (0 = never)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
    /// Bars requested per pair
    #[serde(default = "default_candle_count")]
    pub candle_count: usize,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}
fn default_request_timeout() -> u64 {
    5
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_ping_interval() -> u64 {
    30
}
fn default_pong_timeout() -> u64 {
    10
}
fn default_candle_count() -> usize {
    100
}

impl ProviderConfig {
    /// Connection manager settings
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(self.endpoint.clone())
            .app_id(self.app_id.clone())
            .reconnect_delay(Duration::from_secs(self.reconnect_delay_secs))
            .max_reconnects(self.max_reconnect_attempts)
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
            .pong_timeout(Duration::from_secs(self.pong_timeout_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Instruments, timeframes and indicator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub instruments: Vec<String>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,
    #[serde(default = "default_ema_short")]
    pub ema_short: usize,
    #[serde(default = "default_ema_long")]
    pub ema_long: usize,
    #[serde(default = "default_ema_trend")]
    pub ema_trend: usize,
    #[serde(default = "default_period")]
    pub adx_period: usize,
    #[serde(default = "default_adx_threshold")]
    pub adx_threshold: Decimal,
    #[serde(default = "default_period")]
    pub atr_period: usize,
    #[serde(default = "default_ratio")]
    pub risk_reward_ratio: Decimal,
}

fn default_timeframes() -> Vec<Timeframe> {
    Timeframe::ALL.to_vec()
}
fn default_ema_short() -> usize {
    8
}
fn default_ema_long() -> usize {
    20
}
fn default_ema_trend() -> usize {
    50
}
fn default_period() -> usize {
    14
}
fn default_adx_threshold() -> Decimal {
    Decimal::new(20, 0)
}
fn default_ratio() -> Decimal {
    Decimal::new(2, 0)
}

impl StrategyConfig {
    pub fn periods(&self) -> IndicatorPeriods {
        IndicatorPeriods {
            ema_short: self.ema_short,
            ema_long: self.ema_long,
            ema_trend: self.ema_trend,
            adx: self.adx_period,
            atr: self.atr_period,
        }
    }

    pub fn thresholds(&self) -> DetectorThresholds {
        DetectorThresholds {
            adx_threshold: self.adx_threshold,
            risk_reward_ratio: self.risk_reward_ratio,
            trend_period: self.ema_trend,
        }
    }
}

/// Sweep pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between consecutive pair fetches
    #[serde(default = "default_pair_delay")]
    pub pair_delay_ms: u64,
    /// Pause after a full sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_pair_delay() -> u64 {
    500
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pair_delay_ms: default_pair_delay(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn pair_delay(&self) -> Duration {
        Duration::from_millis(self.pair_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Alert delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
    #[serde(default = "default_alert_timeout")]
    pub request_timeout_secs: u64,
}

fn default_alert_timeout() -> u64 {
    10
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            chat_id: None,
            request_timeout_secs: default_alert_timeout(),
        }
    }
}

impl AlertConfig {
    /// Telegram settings when both token and chat are present
    pub fn telegram(&self) -> Option<TelegramConfig> {
        let token = self.telegram_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
        let mut config = TelegramConfig::new(token, chat_id);
        config.timeout = Duration::from_secs(self.request_timeout_secs);
        Some(config)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port; disabled when unset
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

/// Semantic problems in an otherwise well-formed configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No instruments configured")]
    NoInstruments,
    #[error("No timeframes configured")]
    NoTimeframes,
    #[error("Invalid instrument symbol: {0:?}")]
    InvalidInstrument(String),
    #[error("{0} must be positive")]
    ZeroValue(&'static str),
    #[error("ema_short ({short}) must be below ema_long ({long})")]
    EmaOrder { short: usize, long: usize },
    #[error("risk_reward_ratio must be positive, got {0}")]
    InvalidRatio(Decimal),
    #[error("candle_count ({count}) must cover ema_trend ({trend})")]
    CandleCountTooSmall { count: usize, trend: usize },
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// The built-in default configuration
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Replace credentials with `DERIV_API_TOKEN`, `TELEGRAM_TOKEN` and `CHAT_ID` when set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(token) = lookup("DERIV_API_TOKEN") {
            self.provider.api_token = token;
        }
        if let Some(token) = lookup("TELEGRAM_TOKEN") {
            self.alert.telegram_token = Some(token);
        }
        if let Some(chat_id) = lookup("CHAT_ID") {
            self.alert.chat_id = Some(chat_id);
        }
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strategy = &self.strategy;
        if strategy.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        if let Some(bad) = strategy.instruments.iter().find(|i| !validate_instrument(i)) {
            return Err(ConfigError::InvalidInstrument(bad.clone()));
        }
        if strategy.timeframes.is_empty() {
            return Err(ConfigError::NoTimeframes);
        }
        if let Some(name) = strategy.periods().zero_period() {
            return Err(ConfigError::ZeroValue(name));
        }
        if strategy.ema_short >= strategy.ema_long {
            return Err(ConfigError::EmaOrder {
                short: strategy.ema_short,
                long: strategy.ema_long,
            });
        }
        if strategy.risk_reward_ratio <= Decimal::ZERO {
            return Err(ConfigError::InvalidRatio(strategy.risk_reward_ratio));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("request_timeout_secs"));
        }
        if self.provider.candle_count < strategy.ema_trend {
            return Err(ConfigError::CandleCountTooSmall {
                count: self.provider.candle_count,
                trend: strategy.ema_trend,
            });
        }
        Ok(())
    }

    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.provider.api_token.is_empty() {
            config.provider.api_token = MASK.to_string();
        }
        if config.alert.telegram_token.is_some() {
            config.alert.telegram_token = Some(MASK.to_string());
        }
        config
    }
}
