use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};

use crate::api::{MarketDataSource, SentimentSource};
use crate::config::BotConfig;
use crate::execution::{Executor, OrderGateway, PriceFeed};
use crate::indicators::SentimentReading;
use crate::models::{Decision, ExecutedTrade, PortfolioState, Signal};
use crate::notify::{Notification, NotificationHub};
use crate::persistence::{StateStore, TradeLog, TradeRecord};
use crate::report::{report_due, WeeklyReport};
use crate::strategy::{select_action, EvaluatorConfig, SelectorConfig, SignalEvaluator};

/// What one cycle did
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Market data could not be fetched
    Skipped { reason: String },
    /// Newest bar was already processed
    NoNewData,
    Completed {
        signal: Signal,
        decision: Decision,
        trade: Option<ExecutedTrade>,
    },
    /// The order failed; the portfolio is unchanged
    ExecutionFailed {
        signal: Signal,
        decision: Decision,
        error: String,
    },
}

impl CycleOutcome {
    pub fn trade(&self) -> Option<&ExecutedTrade> {
        match self {
            CycleOutcome::Completed { trade, .. } => trade.as_ref(),
            _ => None,
        }
    }
}

/// Fetch → evaluate → select → execute → notify, one bar at a time
pub struct TradingLoop {
    symbol: String,
    asset: String,
    feed: PriceFeed,
    sentiment: Option<Arc<dyn SentimentSource>>,
    evaluator: SignalEvaluator,
    selector: SelectorConfig,
    executor: Executor,
    state: PortfolioState,
    store: Option<StateStore>,
    trade_log: Option<TradeLog>,
    hub: NotificationHub,
    report_interval_days: i64,
}

impl TradingLoop {
    pub fn new(
        asset: impl Into<String>,
        feed: PriceFeed,
        evaluator: SignalEvaluator,
        selector: SelectorConfig,
        executor: Executor,
        state: PortfolioState,
    ) -> Self {
        Self {
            symbol: feed.symbol().to_string(),
            asset: asset.into(),
            feed,
            sentiment: None,
            evaluator,
            selector,
            executor,
            state,
            store: None,
            trade_log: None,
            hub: NotificationHub::disabled(),
            report_interval_days: 7,
        }
    }

    /// Wire a loop from configuration around the given data source and gateway
    pub fn from_config(
        config: &BotConfig,
        source: Arc<dyn MarketDataSource>,
        gateway: Box<dyn OrderGateway>,
        state: PortfolioState,
    ) -> Self {
        let evaluator = SignalEvaluator::new(EvaluatorConfig::from(&config.strategy));
        let feed = PriceFeed::new(source, config.trading.symbol.clone(), evaluator.window_size());
        let executor = Executor::new(gateway, config.trading.symbol.clone(), config.trading.asset.clone());

        Self::new(
            config.trading.asset.clone(),
            feed,
            evaluator,
            SelectorConfig::from(config),
            executor,
            state,
        )
        .with_report_interval(config.notify.report_interval_days)
    }

    pub fn with_sentiment(mut self, source: Arc<dyn SentimentSource>) -> Self {
        self.sentiment = Some(source);
        self
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_trade_log(mut self, log: TradeLog) -> Self {
        self.trade_log = Some(log);
        self
    }

    pub fn with_notifications(mut self, hub: NotificationHub) -> Self {
        self.hub = hub;
        self
    }

    pub fn with_report_interval(mut self, days: i64) -> Self {
        self.report_interval_days = days;
        self
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn into_state(self) -> PortfolioState {
        self.state
    }

    pub fn announce_startup(&self) {
        self.hub.publish(Notification::Startup {
            symbol: self.symbol.clone(),
            source: self.feed.source_name().to_string(),
            equity: self.state.equity,
        });
    }

    /// Run one decision cycle at time `now`
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        if let Err(e) = self.feed.refresh().await {
            tracing::warn!(symbol = %self.symbol, error = %e, "Market data fetch failed, skipping cycle");
            return CycleOutcome::Skipped {
                reason: e.to_string(),
            };
        }

        let Some(latest) = self.feed.latest().cloned() else {
            return CycleOutcome::Skipped {
                reason: "no bars available".to_string(),
            };
        };

        if let Some(last) = self.state.last_bar_at {
            if latest.timestamp <= last {
                tracing::debug!(bar_time = %latest.timestamp, "No new bar since last cycle");
                return CycleOutcome::NoNewData;
            }
        }

        let sentiment = self.fetch_sentiment().await;

        let bars = self.feed.window().recent(self.evaluator.window_size());
        let signal = self.evaluator.evaluate(
            &bars,
            self.state.position.as_ref(),
            &self.state.budget,
            sentiment.as_ref(),
            now,
        );
        let decision = select_action(
            &signal,
            self.state.position.as_ref(),
            &self.state.budget,
            &self.state.schedule,
            &self.selector,
        );

        tracing::info!(
            bar_time = %latest.timestamp,
            close = latest.close,
            signal = ?signal.kind,
            confidence = signal.confidence,
            action = ?decision.action,
            "{}",
            decision.reason
        );

        let result = self
            .executor
            .execute(&decision.action, &mut self.state, latest.close, now)
            .await;

        // Processed either way; a failed order is not resubmitted on the next tick
        self.state.last_bar_at = Some(latest.timestamp);

        let outcome = match result {
            Ok(trade) => {
                if let Some(trade) = &trade {
                    self.record_trade(trade);
                }
                CycleOutcome::Completed {
                    signal,
                    decision,
                    trade,
                }
            }
            Err(e) => {
                tracing::error!(action = ?decision.action, error = %e, "Order execution failed");
                self.hub.publish(Notification::CycleError {
                    message: format!("{:?} failed: {}", decision.action, e),
                });
                CycleOutcome::ExecutionFailed {
                    signal,
                    decision,
                    error: e.to_string(),
                }
            }
        };

        self.state.equity = self.state.mark_to_market(latest.close);
        self.state.updated_at = now;

        // The report clock starts at the first processed bar
        if self.state.last_report_at.is_none() {
            self.state.last_report_at = Some(now);
        } else if report_due(self.state.last_report_at, now, self.report_interval_days) {
            self.publish_report(now, latest.close);
        }

        self.persist().await;
        outcome
    }

    /// Build and publish a report marked at `mark_price`, then start a new period
    pub fn publish_report(&mut self, now: DateTime<Utc>, mark_price: f64) -> WeeklyReport {
        let since = self.state.last_report_at.unwrap_or(now - chrono::Duration::days(self.report_interval_days));
        let trades = match &self.trade_log {
            Some(log) => log.load_since(since).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not read trade log for report");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let report = WeeklyReport::build(&self.state, &trades, now, mark_price, &self.asset);
        tracing::info!(
            equity = report.equity,
            pnl_usd = report.pnl_usd,
            trades = report.total_trades,
            "📧 {}",
            report.subject()
        );

        self.hub.publish(Notification::WeeklyReport(report.clone()));

        self.state.week_start_equity = report.equity;
        self.state.last_report_at = Some(now);
        report
    }

    /// Send a report on demand, marking at the freshest close available
    pub async fn report_now(&mut self, now: DateTime<Utc>) -> WeeklyReport {
        if let Err(e) = self.feed.refresh().await {
            tracing::warn!(error = %e, "Could not refresh prices for report");
        }

        let mark_price = self
            .feed
            .latest()
            .map(|b| b.close)
            .or_else(|| self.state.position.as_ref().map(|p| p.average_entry_price))
            .unwrap_or(0.0);

        self.state.equity = self.state.mark_to_market(mark_price);
        let report = self.publish_report(now, mark_price);
        self.persist().await;
        report
    }

    /// Drive cycles every `poll_interval` until `shutdown` resolves.
    ///
    /// A cycle in progress always runs to completion.
    pub async fn run_until<F>(&mut self, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping trading loop");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.run_cycle(Utc::now()).await;
                    tracing::debug!(?outcome, "Cycle finished");
                }
            }
        }

        self.persist().await;
    }

    async fn fetch_sentiment(&self) -> Option<SentimentReading> {
        let source = self.sentiment.as_ref()?;
        match source.fetch_sentiment().await {
            Ok(reading) => {
                tracing::debug!(value = reading.value, classification = %reading.classification, "Fear & Greed");
                Some(reading)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sentiment fetch failed, continuing without it");
                None
            }
        }
    }

    fn record_trade(&self, trade: &ExecutedTrade) {
        if let Some(log) = &self.trade_log {
            if let Err(e) = log.append(&TradeRecord::from(trade)) {
                tracing::warn!(error = %e, path = %log.path().display(), "Failed to append trade log");
            }
        }

        self.hub.publish(Notification::Trade {
            symbol: self.symbol.clone(),
            trade: trade.clone(),
            cash_after: self.state.budget.available_capital,
            holdings_after: self.state.holdings(),
        });
    }

    async fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.state).await {
                tracing::warn!(error = %e, path = %store.path().display(), "Failed to save portfolio state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::execution::PaperExchange;
    use crate::models::{Action, PriceBar};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Returns whatever bars are currently set
    struct StaticSource {
        bars: Mutex<Result<Vec<PriceBar>, ()>>,
    }

    #[async_trait]
    impl MarketDataSource for StaticSource {
        async fn fetch_bars(&self, _symbol: &str, _limit: usize) -> Result<Vec<PriceBar>, FetchError> {
            self.bars.lock().unwrap().clone().map_err(|_| FetchError::Empty)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(n)
    }

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                timestamp: day(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn trading_loop(source: Arc<StaticSource>) -> TradingLoop {
        let feed = PriceFeed::new(source, "BTCUSDT", 60);
        TradingLoop::new(
            "BTC",
            feed,
            SignalEvaluator::new(EvaluatorConfig::default()),
            SelectorConfig::default(),
            Executor::new(Box::new(PaperExchange::new(0.0)), "BTCUSDT", "BTC"),
            PortfolioState::new(1000.0, 200.0, 5),
        )
    }

    fn crossover_closes() -> Vec<f64> {
        let mut closes = vec![100.0; 30];
        closes.push(120.0);
        closes
    }

    #[tokio::test]
    async fn test_cycle_buys_on_crossover() {
        let source = Arc::new(StaticSource {
            bars: Mutex::new(Ok(bars(&crossover_closes()))),
        });
        let mut bot = trading_loop(source);

        let outcome = bot.run_cycle(day(31)).await;
        let trade = outcome.trade().expect("expected a buy");
        assert!((trade.quote_amount - 200.0).abs() < 1e-9);
        assert!((bot.state().budget.available_capital - 800.0).abs() < 1e-9);
        assert_eq!(bot.state().last_bar_at, Some(day(30)));
        assert_eq!(bot.state().last_report_at, Some(day(31)));
    }

    #[tokio::test]
    async fn test_same_bar_is_not_processed_twice() {
        let source = Arc::new(StaticSource {
            bars: Mutex::new(Ok(bars(&crossover_closes()))),
        });
        let mut bot = trading_loop(source);

        bot.run_cycle(day(31)).await;
        let outcome = bot.run_cycle(day(31)).await;
        assert!(matches!(outcome, CycleOutcome::NoNewData));
        assert_eq!(bot.state().schedule.completed_intervals, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips() {
        let source = Arc::new(StaticSource {
            bars: Mutex::new(Err(())),
        });
        let mut bot = trading_loop(source);
        let before = bot.state().clone();

        let outcome = bot.run_cycle(day(1)).await;
        assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
        assert_eq!(bot.state(), &before);
    }

    #[tokio::test]
    async fn test_weekly_report_rolls_forward() {
        let source = Arc::new(StaticSource {
            bars: Mutex::new(Ok(bars(&[100.0; 25]))),
        });
        let mut bot = trading_loop(source.clone());

        bot.run_cycle(day(25)).await;
        assert_eq!(bot.state().last_report_at, Some(day(25)));

        *source.bars.lock().unwrap() = Ok(bars(&[100.0; 40]));
        bot.run_cycle(day(32)).await;

        assert_eq!(bot.state().last_report_at, Some(day(32)));
        assert_eq!(bot.state().week_start_equity, bot.state().equity);
    }

    #[tokio::test]
    async fn test_hold_cycle_completes_without_trade() {
        let source = Arc::new(StaticSource {
            bars: Mutex::new(Ok(bars(&[100.0; 25]))),
        });
        let mut bot = trading_loop(source);

        match bot.run_cycle(day(25)).await {
            CycleOutcome::Completed { decision, trade, .. } => {
                assert_eq!(decision.action, Action::Skip);
                assert!(trade.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
