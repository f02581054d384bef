//! Shared helpers for venue adapters
//!
//! WebSocket dialing, reconnect backoff, connection health, the resilient
//! stream client, and REST request signing.

pub mod health;
pub mod reconnect;
pub mod signing;
pub mod stream;
pub mod websocket;

pub use health::{ConnectionHealth, ConnectionState, HealthSnapshot, PendingProbes};
pub use reconnect::{Backoff, ReconnectConfig};
pub use stream::{Inbound, StreamClient, StreamConfig, StreamProtocol, Subscription};
pub use websocket::connect_tls;
