//! Bybit V5 (hedge venue) adapter
//!
//! - `stream`: public linear websocket dialect for the shared `StreamClient`
//! - `client`: signed REST order submission and wallet queries

pub mod client;
pub mod stream;
pub mod types;

pub use client::BybitClient;
pub use stream::BybitProtocol;
