//! Venue adapters for Apex (home) and Bybit (hedge)
//!
//! Market data flows through `shared::StreamClient` with a per-venue
//! `StreamProtocol`; orders and account queries go through `VenueClient`.

pub mod apex;
pub mod bybit;
pub mod errors;
pub mod shared;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use apex::{ApexClient, ApexProtocol};
pub use bybit::{BybitClient, BybitProtocol};
pub use errors::{ExchangeError, ExchangeResult};
pub use shared::{StreamClient, StreamConfig, StreamProtocol};
pub use traits::VenueClient;
pub use types::{AccountInfo, OrderHandle, OrderRequest, OrderSide, OrderType, TimeInForce, TopOfBook};
