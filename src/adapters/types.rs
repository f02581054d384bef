//! Core data types for exchange adapters
//!
//! These types are shared by both venues: top-of-book snapshots decoded from
//! the streams, order requests built by the executor, and account figures
//! consumed by the risk gate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

// =============================================================================
// HTTP Client Constants
// =============================================================================

/// HTTP request timeout (seconds)
const HTTP_TIMEOUT_SECS: u64 = 10;
/// HTTP connection timeout (milliseconds) - fail fast if host unreachable
const HTTP_CONNECT_TIMEOUT_MS: u64 = 3000;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 4;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;
/// TCP keepalive interval (seconds)
const HTTP_TCP_KEEPALIVE_SECS: u64 = 30;

/// Create a pooled HTTP client for a venue's REST API
pub fn create_http_client(venue: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(HTTP_TCP_KEEPALIVE_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .tcp_nodelay(true)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::info!(
        phase = "init",
        venue = %venue,
        timeout_s = HTTP_TIMEOUT_SECS,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        "HTTP client configured"
    );
    client
}

/// Current wall-clock time in Unix milliseconds
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Market Data Types
// =============================================================================

/// Best bid/ask with sizes, as pushed by a venue's depth-1 book feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: f64,
    pub best_bid_size: f64,
    pub best_ask: f64,
    pub best_ask_size: f64,
}

impl TopOfBook {
    /// A quote with any zero price is still warming up and must not be traded on
    pub fn is_tradable(&self) -> bool {
        self.best_bid > 0.0 && self.best_ask > 0.0
    }

    /// Build from the first `[price, size]` level of each side.
    ///
    /// Venues send numbers as strings. Returns `Ok(None)` when either side is
    /// empty (partial delta), which callers skip rather than overwrite with.
    pub fn from_levels(bids: &[Vec<String>], asks: &[Vec<String>]) -> ExchangeResult<Option<Self>> {
        let (Some(bid), Some(ask)) = (bids.first(), asks.first()) else {
            return Ok(None);
        };
        let (best_bid, best_bid_size) = parse_level(bid)?;
        let (best_ask, best_ask_size) = parse_level(ask)?;
        Ok(Some(Self {
            best_bid,
            best_bid_size,
            best_ask,
            best_ask_size,
        }))
    }
}

/// Parse one `[price, size]` string pair
fn parse_level(level: &[String]) -> ExchangeResult<(f64, f64)> {
    let price = level
        .first()
        .ok_or_else(|| ExchangeError::InvalidResponse("empty book level".into()))?;
    let size = level
        .get(1)
        .ok_or_else(|| ExchangeError::InvalidResponse("book level without size".into()))?;
    Ok((parse_decimal("price", price)?, parse_decimal("size", size)?))
}

/// Parse a venue decimal sent as a string
pub fn parse_decimal(field: &str, value: &str) -> ExchangeResult<f64> {
    value
        .parse()
        .map_err(|e| ExchangeError::InvalidResponse(format!("bad {} '{}': {}", field, value, e)))
}

// =============================================================================
// Order Types
// =============================================================================

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

/// Order request handed to a venue's order-submission collaborator.
///
/// Price and quantity are already formatted at the venue precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: String,
    pub price: Option<String>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Marketable IOC limit order at the observed top price
    pub fn ioc_limit(
        client_order_id: String,
        symbol: String,
        side: OrderSide,
        price: String,
        quantity: String,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            time_in_force: TimeInForce::Ioc,
            reduce_only: false,
        }
    }
}

/// Venue acknowledgement of an accepted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
}

/// Account figures used by the risk gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub total_equity: f64,
    pub available_balance: f64,
}
