//! Configuration module for bot settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `StrategyConfig`, `RiskConfig`, ...)
//! - YAML loading with environment credential overrides (`load_config`)

mod loader;
mod types;

pub use types::{ApexConfig, AppConfig, BybitConfig, RiskConfig, StrategyConfig, StreamSettings};

pub use loader::{load_config, load_config_from_str};
