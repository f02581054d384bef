//! Logging setup for arb_bot
//!
//! Structured `tracing` output:
//! - JSON by default (one object per line, for log shipping)
//! - human-readable when `LOG_FORMAT=pretty`
//! - filter from `RUST_LOG`, falling back to `arb_bot=info`
//!
//! Operator-facing lines carry a bracketed tag so they can be grepped out of
//! the JSON stream: `[TRADE]`, `[RISK]`, `[STATUS]`, `[RECONNECT]`, `[NAKED]`.
//!
//! Credentials must only reach a log line wrapped in [`SanitizedValue`]:
//!
//! ```rust,ignore
//! tracing::info!(api_key = %sanitize(&key), "REST client ready");
//! // api_key = "ab12...REDACTED"
//! ```

use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_LEVEL: &str = "arb_bot=info";

/// Redacting wrapper for secrets.
///
/// Values longer than 8 characters keep their first 4 characters, anything
/// shorter is fully redacted. `Debug` never shows any of it.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }
}

impl<'a> fmt::Display for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().count() > 8 {
            let prefix: String = self.0.chars().take(4).collect();
            write!(f, "{}...REDACTED", prefix)
        } else {
            write!(f, "REDACTED")
        }
    }
}

impl<'a> fmt::Debug for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SanitizedValue(***)")
    }
}

/// Shorthand for `SanitizedValue::new`
pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `arb_bot=debug,arb_bot::adapters=trace`
    pub level_filter: String,
    pub use_pretty_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_string(),
            use_pretty_format: false,
        }
    }
}

impl LoggingConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        let level_filter = env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let use_pretty_format = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("pretty"))
            .unwrap_or(false);

        Self {
            level_filter,
            use_pretty_format,
        }
    }
}

/// Initialize logging from the environment. Later calls are no-ops.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::from_env());
}

pub fn init_logging_with_config(config: LoggingConfig) {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let env_filter =
        EnvFilter::try_new(&config.level_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    // try_init: a host process (or a test harness) may already own the global subscriber
    let result = if config.use_pretty_format {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(env_filter)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialized elsewhere: {}", e);
    }
}

/// Test-writer subscriber; safe to call from every test
#[cfg(test)]
pub fn init_test_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_sanitized_value_long_string() {
        assert_eq!(format!("{}", SanitizedValue::new("sk-1234567890abcdef")), "sk-1...REDACTED");
    }

    #[test]
    fn test_sanitized_value_short_and_empty() {
        assert_eq!(format!("{}", SanitizedValue::new("abc")), "REDACTED");
        assert_eq!(format!("{}", SanitizedValue::new("")), "REDACTED");
        // 8 is not > 8
        assert_eq!(format!("{}", SanitizedValue::new("12345678")), "REDACTED");
        assert_eq!(format!("{}", SanitizedValue::new("123456789")), "1234...REDACTED");
    }

    #[test]
    fn test_sanitized_value_multibyte_prefix() {
        // Must not slice inside a UTF-8 sequence
        assert_eq!(format!("{}", sanitize("ééééééééé")), "éééé...REDACTED");
    }

    #[test]
    fn test_sanitized_value_debug() {
        assert_eq!(format!("{:?}", sanitize("sk-1234567890abcdef")), "SanitizedValue(***)");
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level_filter, "arb_bot=info");
        assert!(!config.use_pretty_format);
    }

    #[test]
    #[serial]
    fn test_logging_config_from_env() {
        env::set_var("RUST_LOG", "arb_bot=debug");
        env::set_var("LOG_FORMAT", "Pretty");
        let config = LoggingConfig::from_env();
        assert_eq!(config.level_filter, "arb_bot=debug");
        assert!(config.use_pretty_format);

        env::remove_var("RUST_LOG");
        env::remove_var("LOG_FORMAT");
        assert_eq!(LoggingConfig::from_env(), LoggingConfig::default());
    }

    #[test]
    fn test_double_init_is_noop() {
        init_logging_with_config(LoggingConfig::default());
        init_logging_with_config(LoggingConfig::default());
        assert!(LOGGING_INITIALIZED.load(Ordering::SeqCst));
    }
}
