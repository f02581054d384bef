//! Arbitrage engine
//!
//! Fuses the two venue feeds into a [`MarketView`], runs the fixed-interval
//! decision loop, and owns the position and PnL ledgers.
//!
//! Lifecycle:
//! - `start()`: connect both streams, subscribe to top-of-book, wait for both
//!   sides to quote, then spawn the decision loop and the status reporter
//! - `stop()`: stop both loops, cancel open hedge orders, close both streams
//!
//! Steady-state failures never escape a tick; they are logged and the loop
//! keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::apex::ApexProtocol;
use crate::adapters::bybit::BybitProtocol;
use crate::adapters::shared::StreamClient;
use crate::adapters::traits::VenueClient;
use crate::config::AppConfig;
use crate::core::execution::{spreads, ExecutionParams, ExecutionReport, LegExecutor, LegStatus, Opportunity};
use crate::core::market::MarketView;
use crate::core::risk::{RiskController, RiskRejection};
use crate::error::AppError;

/// Readiness poll period during `start()`
const READY_POLL: Duration = Duration::from_millis(200);

/// What a single decision step did
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// At least one of the four prices is still zero
    NotReady,
    /// Hedge account query failed; nothing is traded on an unknown balance
    AccountUnavailable,
    RiskRejected(RiskRejection),
    /// Take-profit or stop-loss hit; a stop has been requested
    TargetReached,
    NoOpportunity,
    /// Home leg rejected; no state was touched
    Leg1Failed(String),
    Executed(ExecutionReport),
}

struct EngineInner<A: VenueClient + 'static, B: VenueClient + 'static> {
    config: AppConfig,
    home: Arc<A>,
    hedge: Arc<B>,
    home_stream: StreamClient,
    hedge_stream: StreamClient,
    executor: LegExecutor<A, B>,
    market: MarketView,
    risk: RiskController,
    position: Mutex<f64>,
    total_pnl: Mutex<f64>,
    shutdown: CancellationToken,
    /// Set once `stop()` has finished
    done: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopping: AtomicBool,
    stop_requested: AtomicBool,
}

/// Two-venue arbitrage engine. Clones share the same state.
pub struct ArbitrageEngine<A: VenueClient + 'static, B: VenueClient + 'static> {
    inner: Arc<EngineInner<A, B>>,
}

impl<A: VenueClient + 'static, B: VenueClient + 'static> Clone for ArbitrageEngine<A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: VenueClient + 'static, B: VenueClient + 'static> ArbitrageEngine<A, B> {
    /// Engine with streams dialing the configured Apex and Bybit endpoints
    pub fn new(config: AppConfig, home: Arc<A>, hedge: Arc<B>) -> Self {
        let stream_config = config.stream.to_stream_config();
        let home_stream = StreamClient::new(config.apex.ws_url.clone(), Arc::new(ApexProtocol), stream_config);
        let hedge_stream = StreamClient::new(config.bybit.ws_url.clone(), Arc::new(BybitProtocol), stream_config);
        Self::with_streams(config, home, hedge, home_stream, hedge_stream)
    }

    /// Engine over caller-built streams
    pub fn with_streams(
        config: AppConfig,
        home: Arc<A>,
        hedge: Arc<B>,
        home_stream: StreamClient,
        hedge_stream: StreamClient,
    ) -> Self {
        let strategy = &config.strategy;
        let executor = LegExecutor::new(
            Arc::clone(&home),
            Arc::clone(&hedge),
            ExecutionParams {
                home_symbol: config.apex_symbol.clone(),
                hedge_symbol: config.bybit_symbol.clone(),
                order_size: strategy.order_size,
                price_precision: strategy.price_precision,
                size_precision: strategy.size_precision,
                hedge_mode: strategy.hedge_mode,
            },
        );
        let risk = RiskController::new(config.risk_control.clone());

        Self {
            inner: Arc::new(EngineInner {
                config,
                home,
                hedge,
                home_stream,
                hedge_stream,
                executor,
                market: MarketView::new(),
                risk,
                position: Mutex::new(0.0),
                total_pnl: Mutex::new(0.0),
                shutdown: CancellationToken::new(),
                done: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Wire both feeds, wait for quotes, then start trading.
    ///
    /// Any error here is a startup failure; both streams are closed before returning it.
    pub async fn start(&self) -> Result<(), AppError> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Err(AppError::Startup("engine already stopped".into()));
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(AppError::Startup("engine already started".into()));
        }

        let config = &self.inner.config;
        info!(
            home = self.inner.home.venue_name(),
            home_symbol = %config.apex_symbol,
            hedge = self.inner.hedge.venue_name(),
            hedge_symbol = %config.bybit_symbol,
            min_spread = config.strategy.min_spread_usdc,
            order_size = config.strategy.order_size,
            hedge_mode = config.strategy.hedge_mode,
            "Arbitrage engine starting"
        );

        if let Err(e) = self.wire_feeds().await {
            self.inner.home_stream.close().await;
            self.inner.hedge_stream.close().await;
            return Err(e);
        }

        let timeout = Duration::from_secs(config.strategy.ready_timeout_secs);
        if let Err(e) = self.wait_for_market_data(timeout).await {
            self.inner.home_stream.close().await;
            self.inner.hedge_stream.close().await;
            return Err(e);
        }
        info!("Market data ready, arbitrage loop running");

        let decision = tokio::spawn(self.clone().decision_loop());
        let status = tokio::spawn(self.clone().status_loop());
        self.inner.tasks.lock().await.extend([decision, status]);
        Ok(())
    }

    async fn wire_feeds(&self) -> Result<(), AppError> {
        let config = &self.inner.config;

        self.inner.home_stream.connect().await?;
        let home_quote = Arc::clone(&self.inner.market.home);
        self.inner
            .home_stream
            .subscribe_order_book(&config.apex_symbol, move |book| home_quote.store(book))
            .await?;

        self.inner.hedge_stream.connect().await?;
        let hedge_quote = Arc::clone(&self.inner.market.hedge);
        self.inner
            .hedge_stream
            .subscribe_order_book(&config.bybit_symbol, move |book| hedge_quote.store(book))
            .await?;

        Ok(())
    }

    async fn wait_for_market_data(&self, timeout: Duration) -> Result<(), AppError> {
        let deadline = Instant::now() + timeout;
        let mut poll = interval(READY_POLL);
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    return Err(AppError::Startup("engine stopped while waiting for market data".into()));
                }
                _ = poll.tick() => {}
            }
            if self.inner.market.is_ready() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let (home, hedge) = self.inner.market.snapshot();
                return Err(AppError::Startup(format!(
                    "market data not ready after {}s (home ready: {}, hedge ready: {})",
                    timeout.as_secs(),
                    home.is_tradable(),
                    hedge.is_tradable()
                )));
            }
        }
    }

    /// Stop both loops, cancel hedge orders, close both streams. Idempotent;
    /// a concurrent caller waits for the first stop to finish.
    pub async fn stop(&self) {
        if self.inner.stopping.swap(true, Ordering::SeqCst) {
            self.inner.done.cancelled().await;
            return;
        }
        info!("Stopping arbitrage engine");
        self.inner.shutdown.cancel();

        let handles: Vec<_> = std::mem::take(&mut *self.inner.tasks.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Engine task ended abnormally");
            }
        }

        let symbol = &self.inner.config.bybit_symbol;
        match self.inner.hedge.cancel_all_orders(symbol).await {
            Ok(()) => info!(venue = self.inner.hedge.venue_name(), symbol = %symbol, "Open hedge orders cancelled"),
            Err(e) => warn!(venue = self.inner.hedge.venue_name(), error = %e, "Failed to cancel open hedge orders"),
        }

        self.inner.home_stream.close().await;
        self.inner.hedge_stream.close().await;

        let total_pnl = *self.inner.total_pnl.lock().await;
        let position = *self.inner.position.lock().await;
        info!(total_pnl, position, "Arbitrage engine stopped");
        self.inner.done.cancel();
    }

    /// Run `stop()` on its own task, at most once. Returns false if a stop was already requested.
    pub fn request_stop(&self) -> bool {
        if self.inner.stop_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        let engine = self.clone();
        tokio::spawn(async move { engine.stop().await });
        true
    }

    /// Resolves once `stop()` has completed
    pub async fn stopped(&self) {
        self.inner.done.cancelled().await
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    // =========================================================================
    // Decision step
    // =========================================================================

    async fn decision_loop(self) {
        let mut ticker = interval(Duration::from_millis(self.inner.config.strategy.check_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        debug!("Decision loop exited");
    }

    /// One decision step
    pub async fn tick(&self) -> TickOutcome {
        let inner = &*self.inner;
        let strategy = &inner.config.strategy;

        let (home, hedge) = inner.market.snapshot();
        if !home.is_tradable() || !hedge.is_tradable() {
            return TickOutcome::NotReady;
        }

        let account = match inner.hedge.get_account().await {
            Ok(account) => account,
            Err(e) => {
                warn!(venue = inner.hedge.venue_name(), error = %e, "Account query failed, skipping tick");
                return TickOutcome::AccountUnavailable;
            }
        };

        if let Err(rejection) = inner.risk.check(account.available_balance) {
            debug!(reason = %rejection, "[RISK] Trade blocked");
            return TickOutcome::RiskRejected(rejection);
        }

        let pnl = *inner.total_pnl.lock().await;
        if pnl >= strategy.take_profit_usdc {
            if self.request_stop() {
                info!(total_pnl = pnl, target = strategy.take_profit_usdc, "[TRADE] Take-profit reached, stopping");
            }
            return TickOutcome::TargetReached;
        }
        if pnl <= -strategy.stop_loss_usdc {
            if self.request_stop() {
                warn!(total_pnl = pnl, limit = strategy.stop_loss_usdc, "[TRADE] Stop-loss hit, stopping");
            }
            return TickOutcome::TargetReached;
        }

        let position = *inner.position.lock().await;
        let Some(opportunity) = Opportunity::evaluate(
            &home,
            &hedge,
            position,
            strategy.min_spread_usdc,
            strategy.max_position,
        ) else {
            return TickOutcome::NoOpportunity;
        };

        info!(
            kind = %opportunity.kind,
            home_price = opportunity.home_price,
            hedge_price = opportunity.hedge_price,
            spread = opportunity.spread,
            position,
            "[TRADE] Opportunity found"
        );

        let report = inner.executor.execute(opportunity).await;
        if !report.traded() {
            let reason = match &report.leg1 {
                LegStatus::Failed(reason) => reason.clone(),
                _ => String::new(),
            };
            return TickOutcome::Leg1Failed(reason);
        }

        let position = {
            let mut guard = inner.position.lock().await;
            *guard += report.position_delta;
            *guard
        };
        let total_pnl = {
            let mut guard = inner.total_pnl.lock().await;
            *guard += report.estimated_pnl;
            *guard
        };
        inner.risk.record_trade(report.estimated_pnl);

        info!(
            position,
            total_pnl,
            naked = report.naked,
            "[TRADE] Ledger updated"
        );
        TickOutcome::Executed(report)
    }

    // =========================================================================
    // Status reporter
    // =========================================================================

    async fn status_loop(self) {
        let period = Duration::from_secs(self.inner.config.strategy.status_interval_secs);
        let mut ticker = interval(period);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                _ = ticker.tick() => self.log_status().await,
            }
        }
        debug!("Status reporter exited");
    }

    /// Log quotes, spreads, ledger and feed health. Read-only.
    pub async fn log_status(&self) {
        let inner = &*self.inner;
        let (home, hedge) = inner.market.snapshot();
        let (buy_home_spread, sell_home_spread) = spreads(&home, &hedge);
        let position = *inner.position.lock().await;
        let total_pnl = *inner.total_pnl.lock().await;
        let risk = inner.risk.snapshot();
        let home_feed = inner.home_stream.health();
        let hedge_feed = inner.hedge_stream.health();

        info!(
            home_bid = home.best_bid,
            home_ask = home.best_ask,
            hedge_bid = hedge.best_bid,
            hedge_ask = hedge.best_ask,
            buy_home_spread,
            sell_home_spread,
            position = position.abs(),
            total_pnl,
            daily_pnl = risk.daily_pnl,
            halted = risk.halted,
            home_feed = %home_feed.state,
            home_reconnects = home_feed.reconnect_count,
            home_msg_age_ms = home_feed.last_message_age.as_millis() as u64,
            hedge_feed = %hedge_feed.state,
            hedge_reconnects = hedge_feed.reconnect_count,
            hedge_msg_age_ms = hedge_feed.last_message_age.as_millis() as u64,
            "[STATUS]"
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub async fn position(&self) -> f64 {
        *self.inner.position.lock().await
    }

    pub async fn total_pnl(&self) -> f64 {
        *self.inner.total_pnl.lock().await
    }

    pub fn risk(&self) -> &RiskController {
        &self.inner.risk
    }

    pub fn market(&self) -> &MarketView {
        &self.inner.market
    }

    pub fn home_stream(&self) -> &StreamClient {
        &self.inner.home_stream
    }

    pub fn hedge_stream(&self) -> &StreamClient {
        &self.inner.hedge_stream
    }
}
