//! Risk circuit breaker
//!
//! `RiskController` gates every trade attempt and absorbs trade outcomes.
//! A trip (low balance, daily loss, loss streak) latches `halted`: later
//! checks keep rejecting with the first reason until an explicit `reset()`
//! or the local day rolls over.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration as ChronoDuration, Local};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RiskConfig;

/// Why a trade attempt was refused
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RiskRejection {
    #[error("circuit breaker halted: {0}")]
    Halted(String),

    #[error("available balance {available:.2} USDC below floor {floor:.2} USDC")]
    LowBalance { available: f64, floor: f64 },

    #[error("daily loss {loss:.2} USDC exceeds limit {limit:.2} USDC")]
    DailyLoss { loss: f64, limit: f64 },

    #[error("{count} consecutive losses reached limit {limit}")]
    ConsecutiveLosses { count: u32, limit: u32 },
}

/// Copy of the controller state for status lines and tests
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSnapshot {
    pub daily_pnl: f64,
    pub consecutive_losses: u32,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub day_start: DateTime<Local>,
}

#[derive(Debug)]
struct RiskState {
    daily_pnl: f64,
    consecutive_losses: u32,
    halted: bool,
    halt_reason: String,
    day_start: DateTime<Local>,
}

impl RiskState {
    /// Latch the halt. The first reason sticks.
    fn halt(&mut self, rejection: RiskRejection) -> RiskRejection {
        if !self.halted {
            self.halted = true;
            self.halt_reason = rejection.to_string();
            warn!(reason = %self.halt_reason, "[RISK] Circuit breaker tripped");
        }
        rejection
    }

    fn roll_day_if_needed(&mut self, now: DateTime<Local>) {
        if now > self.day_start + ChronoDuration::hours(24) {
            self.daily_pnl = 0.0;
            self.consecutive_losses = 0;
            self.halted = false;
            self.halt_reason.clear();
            self.day_start = local_midnight(now);
            info!(day_start = %self.day_start, "[RISK] New trading day, daily stats reset");
        }
    }
}

/// Midnight of `now`'s local date; `now` itself if midnight does not exist (DST gap)
fn local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or(now)
}

/// Circuit breaker; one mutex guards all fields so checks see a consistent state
#[derive(Debug)]
pub struct RiskController {
    config: RiskConfig,
    state: Mutex<RiskState>,
}

impl RiskController {
    pub fn new(config: RiskConfig) -> Self {
        Self::new_at(config, Local::now())
    }

    /// Controller whose trading day starts at the local midnight before `now`
    pub fn new_at(config: RiskConfig, now: DateTime<Local>) -> Self {
        Self {
            config,
            state: Mutex::new(RiskState {
                daily_pnl: 0.0,
                consecutive_losses: 0,
                halted: false,
                halt_reason: String::new(),
                day_start: local_midnight(now),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RiskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Gate a trade attempt against the current wall clock
    pub fn check(&self, available_balance: f64) -> Result<(), RiskRejection> {
        self.check_at(available_balance, Local::now())
    }

    /// Gate a trade attempt at `now`. Checks short-circuit in order:
    /// day rollover, sticky halt, balance floor, daily loss, loss streak.
    pub fn check_at(&self, available_balance: f64, now: DateTime<Local>) -> Result<(), RiskRejection> {
        let mut state = self.lock();
        state.roll_day_if_needed(now);

        if state.halted {
            return Err(RiskRejection::Halted(state.halt_reason.clone()));
        }

        if available_balance < self.config.min_balance_usdc {
            return Err(state.halt(RiskRejection::LowBalance {
                available: available_balance,
                floor: self.config.min_balance_usdc,
            }));
        }

        if state.daily_pnl < -self.config.max_daily_loss_usdc {
            let loss = -state.daily_pnl;
            return Err(state.halt(RiskRejection::DailyLoss {
                loss,
                limit: self.config.max_daily_loss_usdc,
            }));
        }

        if state.consecutive_losses >= self.config.max_consecutive_loss {
            let count = state.consecutive_losses;
            return Err(state.halt(RiskRejection::ConsecutiveLosses {
                count,
                limit: self.config.max_consecutive_loss,
            }));
        }

        Ok(())
    }

    /// Absorb a trade outcome
    pub fn record_trade(&self, pnl: f64) {
        let mut state = self.lock();
        state.daily_pnl += pnl;
        if pnl < 0.0 {
            state.consecutive_losses = state.consecutive_losses.saturating_add(1);
            info!(
                pnl,
                daily_pnl = state.daily_pnl,
                consecutive_losses = state.consecutive_losses,
                "[RISK] Losing trade recorded"
            );
        } else {
            state.consecutive_losses = 0;
            info!(pnl, daily_pnl = state.daily_pnl, "[RISK] Winning trade recorded");
        }
    }

    /// Operator action: clear the halt and the loss streak. Daily PnL is kept.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.halted = false;
        state.halt_reason.clear();
        state.consecutive_losses = 0;
        info!("[RISK] Circuit breaker manually reset");
    }

    pub fn daily_pnl(&self) -> f64 {
        self.lock().daily_pnl
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let state = self.lock();
        RiskSnapshot {
            daily_pnl: state.daily_pnl,
            consecutive_losses: state.consecutive_losses,
            halted: state.halted,
            halt_reason: state.halted.then(|| state.halt_reason.clone()),
            day_start: state.day_start,
        }
    }
}
