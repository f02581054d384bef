//! Application-wide error types using thiserror
//!
//! Startup and configuration failures surface as `AppError` and abort the
//! process. Steady-state venue failures stay inside the engine and only show
//! up in logs.

use thiserror::Error;

use crate::adapters::errors::ExchangeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("order_size must be > 0".into());
        assert_eq!(err.to_string(), "Configuration error: order_size must be > 0");
    }

    #[test]
    fn test_exchange_error_converts() {
        let err: AppError = ExchangeError::Closed.into();
        assert!(matches!(err, AppError::Exchange(ExchangeError::Closed)));
        assert_eq!(err.to_string(), "Exchange error: Client closed");
    }

    #[test]
    fn test_startup_error_display() {
        let err = AppError::Startup("market data not ready after 10s".into());
        assert!(err.to_string().starts_with("Startup error:"));
    }
}
