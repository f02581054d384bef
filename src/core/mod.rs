//! Core module - market state, risk, execution, engine, logging
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to keep the public API deliberate.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{ArbitrageEngine, RiskController, MarketView};
//! ```

pub mod engine;
pub mod execution;
pub mod logging;
pub mod market;
pub mod risk;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{ArbitrageEngine, TickOutcome};

pub use execution::{
    format_decimal, spreads, ExecutionParams, ExecutionReport, LegExecutor, LegStatus, Opportunity,
    OpportunityKind,
};

pub use logging::{
    init_logging, init_logging_with_config, sanitize, LoggingConfig, SanitizedValue, DEFAULT_LOG_LEVEL,
};

pub use market::{MarketView, PriceCell, VenueQuote};

pub use risk::{RiskController, RiskRejection, RiskSnapshot};
