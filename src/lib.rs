//! Two-venue arbitrage bot
//!
//! - Self-healing websocket market data for Apex (home) and Bybit (hedge)
//! - Top-of-book spread detection with a position cap
//! - Two-leg IOC execution gated by a risk circuit breaker

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
