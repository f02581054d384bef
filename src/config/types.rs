//! Configuration types for the arbitrage bot
//!
//! Loaded once from YAML before the engine is built. Credentials can be
//! overridden from the environment so they never need to live in the file.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::shared::reconnect::ReconnectConfig;
use crate::adapters::shared::stream::StreamConfig;
use crate::error::AppError;

/// Decimal places accepted for price/size formatting
const MAX_PRECISION: u32 = 12;

// ============================================================================
// Venue sections
// ============================================================================

/// Apex (home venue) endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApexConfig {
    pub base_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub passphrase: String,
}

/// Bybit (hedge venue) endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BybitConfig {
    pub base_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

// ============================================================================
// Strategy / risk
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_ready_timeout_secs() -> u64 {
    10
}

fn default_status_interval_secs() -> u64 {
    30
}

/// Spread-capture strategy thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    /// Minimum cross-venue spread (USDC) that triggers a trade
    pub min_spread_usdc: f64,
    /// Size of each leg, in contracts
    pub order_size: f64,
    /// Absolute cap on net position, in contracts
    pub max_position: f64,
    /// Decision loop tick
    pub check_interval_ms: u64,
    /// Stop the engine once cumulative PnL reaches this
    pub take_profit_usdc: f64,
    /// Stop the engine once cumulative PnL falls to minus this
    pub stop_loss_usdc: f64,
    pub price_precision: u32,
    pub size_precision: u32,
    /// Send the offsetting leg on the hedge venue
    #[serde(default = "default_true")]
    pub hedge_mode: bool,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_spread_usdc: 1.0,
            order_size: 0.01,
            max_position: 0.1,
            check_interval_ms: 200,
            take_profit_usdc: 100.0,
            stop_loss_usdc: 50.0,
            price_precision: 2,
            size_precision: 3,
            hedge_mode: true,
            ready_timeout_secs: default_ready_timeout_secs(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

/// Circuit breaker limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    pub max_daily_loss_usdc: f64,
    pub max_consecutive_loss: u32,
    pub min_balance_usdc: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_usdc: 50.0,
            max_consecutive_loss: 5,
            min_balance_usdc: 100.0,
        }
    }
}

/// Websocket tunables shared by both venue streams
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamSettings {
    pub dial_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 10_000,
            ping_interval_ms: 20_000,
            pong_timeout_ms: 10_000,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

impl StreamSettings {
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            dial_timeout: Duration::from_millis(self.dial_timeout_ms),
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            pong_timeout: Duration::from_millis(self.pong_timeout_ms),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.backoff_initial_ms),
                max_delay: Duration::from_millis(self.backoff_max_ms),
            },
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub apex: ApexConfig,
    pub bybit: BybitConfig,
    /// e.g. BTC-USDC
    pub apex_symbol: String,
    /// e.g. BTCUSDT
    pub bybit_symbol: String,
    pub strategy: StrategyConfig,
    pub risk_control: RiskConfig,
    #[serde(default)]
    pub stream: StreamSettings,
}

impl AppConfig {
    /// Environment wins over the file for credentials. Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) {
        fn over(target: &mut String, var: &str) {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }

        over(&mut self.apex.api_key, "APEX_API_KEY");
        over(&mut self.apex.api_secret, "APEX_API_SECRET");
        over(&mut self.apex.passphrase, "APEX_PASSPHRASE");
        over(&mut self.bybit.api_key, "BYBIT_API_KEY");
        over(&mut self.bybit.api_secret, "BYBIT_API_SECRET");
    }

    /// Validate configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("apex_symbol", &self.apex_symbol),
            ("bybit_symbol", &self.bybit_symbol),
            ("apex.base_url", &self.apex.base_url),
            ("apex.ws_url", &self.apex.ws_url),
            ("bybit.base_url", &self.bybit.base_url),
            ("bybit.ws_url", &self.bybit.ws_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", name)));
            }
        }

        let s = &self.strategy;
        let positive = [
            ("strategy.min_spread_usdc", s.min_spread_usdc),
            ("strategy.order_size", s.order_size),
            ("strategy.max_position", s.max_position),
            // Both targets are compared against a PnL that starts at 0
            ("strategy.take_profit_usdc", s.take_profit_usdc),
            ("strategy.stop_loss_usdc", s.stop_loss_usdc),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(AppError::Config(format!("{} must be > 0 (got {})", name, value)));
            }
        }

        if s.check_interval_ms == 0 {
            return Err(AppError::Config("strategy.check_interval_ms must be > 0".into()));
        }
        if s.status_interval_secs == 0 {
            return Err(AppError::Config("strategy.status_interval_secs must be > 0".into()));
        }
        if s.price_precision > MAX_PRECISION || s.size_precision > MAX_PRECISION {
            return Err(AppError::Config(format!(
                "strategy precision must be <= {} (price {}, size {})",
                MAX_PRECISION, s.price_precision, s.size_precision
            )));
        }

        let r = &self.risk_control;
        if r.max_daily_loss_usdc < 0.0 || r.min_balance_usdc < 0.0 {
            return Err(AppError::Config("risk_control limits cannot be negative".into()));
        }
        if r.max_consecutive_loss == 0 {
            return Err(AppError::Config("risk_control.max_consecutive_loss must be >= 1".into()));
        }

        let st = &self.stream;
        if st.dial_timeout_ms == 0 || st.ping_interval_ms == 0 || st.pong_timeout_ms == 0 {
            return Err(AppError::Config("stream timeouts must be > 0".into()));
        }
        if st.backoff_initial_ms == 0 || st.backoff_max_ms < st.backoff_initial_ms {
            return Err(AppError::Config(format!(
                "stream backoff must satisfy 0 < initial ({}) <= max ({})",
                st.backoff_initial_ms, st.backoff_max_ms
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            apex: ApexConfig {
                base_url: "https://pro.apex.exchange".into(),
                ws_url: "wss://quote.pro.apex.exchange/realtime_public".into(),
                api_key: "k".into(),
                api_secret: "s".into(),
                passphrase: "p".into(),
            },
            bybit: BybitConfig {
                base_url: "https://api.bybit.com".into(),
                ws_url: "wss://stream.bybit.com/v5/public/linear".into(),
                api_key: "k".into(),
                api_secret: "s".into(),
            },
            apex_symbol: "BTC-USDC".into(),
            bybit_symbol: "BTCUSDT".into(),
            strategy: StrategyConfig::default(),
            risk_control: RiskConfig::default(),
            stream: StreamSettings::default(),
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let mut config = sample();
        config.bybit_symbol = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bybit_symbol"));
    }

    #[test]
    fn test_non_positive_order_size_rejected() {
        let mut config = sample();
        config.strategy.order_size = 0.0;
        assert!(config.validate().is_err());
        config.strategy.order_size = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_take_profit_rejected() {
        let mut config = sample();
        config.strategy.take_profit_usdc = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("take_profit_usdc"));
    }

    #[test]
    fn test_precision_cap() {
        let mut config = sample();
        config.strategy.price_precision = 13;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_loss_streak_rejected() {
        let mut config = sample();
        config.risk_control.max_consecutive_loss = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_ordering() {
        let mut config = sample();
        config.stream.backoff_max_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_settings_conversion() {
        let stream = StreamSettings::default().to_stream_config();
        assert_eq!(stream, StreamConfig::default());
    }
}
