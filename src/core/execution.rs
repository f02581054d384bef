//! Two-leg arbitrage execution
//!
//! # Architecture
//! - `Opportunity`: a priced cross-venue discrepancy picked from two top-of-book snapshots
//! - `LegExecutor`: submits leg 1 on the home venue, then (hedge mode) leg 2 on the hedge venue
//! - `ExecutionReport`: what happened to each leg, plus the bookkeeping the engine must apply
//!
//! Legs are sequential, not joined: leg 2 is only sent once leg 1 was accepted.
//! A rejected leg 2 leaves a naked position which is reported, never unwound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::traits::VenueClient;
use crate::adapters::types::{OrderHandle, OrderRequest, OrderSide, TopOfBook};

// =============================================================================
// Opportunity detection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpportunityKind {
    /// Home ask below hedge bid: buy home, sell hedge
    BuyHomeSellHedge,
    /// Home bid above hedge ask: sell home, buy hedge
    SellHomeBuyHedge,
}

impl OpportunityKind {
    pub fn home_side(self) -> OrderSide {
        match self {
            OpportunityKind::BuyHomeSellHedge => OrderSide::Buy,
            OpportunityKind::SellHomeBuyHedge => OrderSide::Sell,
        }
    }

    pub fn hedge_side(self) -> OrderSide {
        self.home_side().opposite()
    }

    /// Sign applied to the order size when updating net position
    pub fn position_sign(self) -> f64 {
        match self {
            OpportunityKind::BuyHomeSellHedge => 1.0,
            OpportunityKind::SellHomeBuyHedge => -1.0,
        }
    }
}

impl std::fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpportunityKind::BuyHomeSellHedge => write!(f, "buy_home_sell_hedge"),
            OpportunityKind::SellHomeBuyHedge => write!(f, "sell_home_buy_hedge"),
        }
    }
}

/// Both directional spreads: `(hedge_bid - home_ask, home_bid - hedge_ask)`
pub fn spreads(home: &TopOfBook, hedge: &TopOfBook) -> (f64, f64) {
    (hedge.best_bid - home.best_ask, home.best_bid - hedge.best_ask)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opportunity {
    pub kind: OpportunityKind,
    /// Observed top price the home leg crosses
    pub home_price: f64,
    /// Observed opposing top price the hedge leg crosses
    pub hedge_price: f64,
    pub spread: f64,
}

impl Opportunity {
    /// Pick at most one opportunity. The buy-home direction is checked first;
    /// each direction must clear `min_spread` and leave room under the position cap.
    pub fn evaluate(
        home: &TopOfBook,
        hedge: &TopOfBook,
        position: f64,
        min_spread: f64,
        max_position: f64,
    ) -> Option<Self> {
        let (buy_home, sell_home) = spreads(home, hedge);

        if buy_home >= min_spread && position < max_position {
            return Some(Self {
                kind: OpportunityKind::BuyHomeSellHedge,
                home_price: home.best_ask,
                hedge_price: hedge.best_bid,
                spread: buy_home,
            });
        }

        if sell_home >= min_spread && position > -max_position {
            return Some(Self {
                kind: OpportunityKind::SellHomeBuyHedge,
                home_price: home.best_bid,
                hedge_price: hedge.best_ask,
                spread: sell_home,
            });
        }

        None
    }
}

// =============================================================================
// Execution result
// =============================================================================

/// Outcome of a single leg
#[derive(Debug, Clone, PartialEq)]
pub enum LegStatus {
    Accepted(OrderHandle),
    Failed(String),
    /// Not sent: leg 1 failed, or hedge mode is off
    Skipped,
}

impl LegStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LegStatus::Accepted(_))
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub opportunity: Opportunity,
    pub leg1: LegStatus,
    pub leg2: LegStatus,
    /// Leg 1 went through but its hedge was rejected
    pub naked: bool,
    /// `spread * order_size`; fill prices are not consulted
    pub estimated_pnl: f64,
    /// Signed change to net position
    pub position_delta: f64,
    pub latency: Duration,
}

impl ExecutionReport {
    /// Whether real exposure changed and bookkeeping must be applied
    pub fn traded(&self) -> bool {
        self.leg1.is_success()
    }
}

// =============================================================================
// LegExecutor
// =============================================================================

/// Sizing and formatting parameters for the executor
#[derive(Debug, Clone)]
pub struct ExecutionParams {
    pub home_symbol: String,
    pub hedge_symbol: String,
    pub order_size: f64,
    pub price_precision: u32,
    pub size_precision: u32,
    pub hedge_mode: bool,
}

/// Fixed-precision decimal string, e.g. `format_decimal(100.456, 2) == "100.46"`
pub fn format_decimal(value: f64, precision: u32) -> String {
    format!("{:.*}", precision as usize, value)
}

pub struct LegExecutor<A, B>
where
    A: VenueClient + ?Sized,
    B: VenueClient + ?Sized,
{
    home: Arc<A>,
    hedge: Arc<B>,
    params: ExecutionParams,
}

impl<A, B> LegExecutor<A, B>
where
    A: VenueClient + ?Sized,
    B: VenueClient + ?Sized,
{
    pub fn new(home: Arc<A>, hedge: Arc<B>, params: ExecutionParams) -> Self {
        Self { home, hedge, params }
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    fn order(&self, symbol: &str, side: OrderSide, price: f64) -> OrderRequest {
        OrderRequest::ioc_limit(
            Uuid::new_v4().to_string(),
            symbol.to_string(),
            side,
            format_decimal(price, self.params.price_precision),
            format_decimal(self.params.order_size, self.params.size_precision),
        )
    }

    /// Submit leg 1, then leg 2 when hedging. Never returns an error: every
    /// failure is folded into the report so the caller's loop keeps ticking.
    pub async fn execute(&self, opportunity: Opportunity) -> ExecutionReport {
        let start = Instant::now();
        let kind = opportunity.kind;

        let leg1_order = self.order(&self.params.home_symbol, kind.home_side(), opportunity.home_price);
        let leg1 = match self.home.place_order(leg1_order.clone()).await {
            Ok(handle) => LegStatus::Accepted(handle),
            Err(e) => {
                warn!(
                    venue = self.home.venue_name(),
                    kind = %kind,
                    side = %leg1_order.side,
                    price = %leg1_order.price.as_deref().unwrap_or_default(),
                    qty = %leg1_order.quantity,
                    error = %e,
                    "[TRADE] Leg 1 rejected, tick aborted"
                );
                return ExecutionReport {
                    opportunity,
                    leg1: LegStatus::Failed(e.to_string()),
                    leg2: LegStatus::Skipped,
                    naked: false,
                    estimated_pnl: 0.0,
                    position_delta: 0.0,
                    latency: start.elapsed(),
                };
            }
        };

        let leg2 = if self.params.hedge_mode {
            let leg2_order = self.order(&self.params.hedge_symbol, kind.hedge_side(), opportunity.hedge_price);
            match self.hedge.place_order(leg2_order.clone()).await {
                Ok(handle) => LegStatus::Accepted(handle),
                Err(e) => {
                    error!(
                        home_venue = self.home.venue_name(),
                        hedge_venue = self.hedge.venue_name(),
                        kind = %kind,
                        side = %leg2_order.side,
                        price = %leg2_order.price.as_deref().unwrap_or_default(),
                        qty = %leg2_order.quantity,
                        error = %e,
                        "[NAKED] Hedge leg rejected, home leg is unhedged"
                    );
                    LegStatus::Failed(e.to_string())
                }
            }
        } else {
            LegStatus::Skipped
        };

        let naked = matches!(leg2, LegStatus::Failed(_));
        let estimated_pnl = opportunity.spread * self.params.order_size;
        let position_delta = kind.position_sign() * self.params.order_size;
        let latency = start.elapsed();

        info!(
            kind = %kind,
            home_price = opportunity.home_price,
            hedge_price = opportunity.hedge_price,
            spread = opportunity.spread,
            size = self.params.order_size,
            estimated_pnl,
            hedged = leg2.is_success(),
            latency_ms = latency.as_millis() as u64,
            "[TRADE] Executed"
        );

        ExecutionReport {
            opportunity,
            leg1,
            leg2,
            naked,
            estimated_pnl,
            position_delta,
            latency,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
