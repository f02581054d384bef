//! Apex (home venue) adapter
//!
//! - `stream`: websocket dialect for the shared `StreamClient`
//! - `client`: signed REST order submission and account queries

pub mod client;
pub mod stream;
pub mod types;

pub use client::ApexClient;
pub use stream::ApexProtocol;
