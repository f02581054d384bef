//! Exchange adapter error types
//!
//! All venue-facing errors (websocket, REST, decoding) are wrapped in
//! `ExchangeError` so the core only ever sees one error type from adapters.

use thiserror::Error;

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Connection to exchange failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscription to market data failed
    #[error("Subscription failed for {topic}: {reason}")]
    SubscriptionFailed { topic: String, reason: String },

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Order rejected by the venue (business error code or HTTP status)
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Request signing failed (bad secret)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// Client was closed and will not reconnect
    #[error("Client closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(Box::new(e))
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
