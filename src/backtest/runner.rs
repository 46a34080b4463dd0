use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::api::MarketDataSource;
use crate::backtest::metrics::BacktestMetrics;
use crate::config::BotConfig;
use crate::engine::{CycleOutcome, TradingLoop};
use crate::error::FetchError;
use crate::execution::PaperExchange;
use crate::models::{PortfolioState, PriceBar};
use crate::Result;

/// Serves a fixed history one bar at a time
///
/// Each fetch reveals one more bar, so the loop sees exactly what it would
/// have seen live on that day.
pub struct ReplaySource {
    bars: Vec<PriceBar>,
    revealed: AtomicUsize,
}

impl ReplaySource {
    pub fn new(bars: Vec<PriceBar>) -> Self {
        Self {
            bars,
            revealed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MarketDataSource for ReplaySource {
    async fn fetch_bars(&self, _symbol: &str, limit: usize) -> std::result::Result<Vec<PriceBar>, FetchError> {
        let revealed = (self.revealed.fetch_add(1, Ordering::SeqCst) + 1).min(self.bars.len());
        if revealed == 0 {
            return Err(FetchError::Empty);
        }

        let start = revealed.saturating_sub(limit);
        Ok(self.bars[start..revealed].to_vec())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Replays history through the real trading loop with paper fills
pub struct BacktestRunner {
    config: BotConfig,
}

impl BacktestRunner {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }

    /// Run the loop once per bar and collect metrics
    pub async fn run(&self, mut bars: Vec<PriceBar>) -> Result<BacktestMetrics> {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        if bars.is_empty() {
            return Err("No bars to replay".into());
        }

        let trading = &self.config.trading;
        let initial_equity = trading.initial_capital;
        let timestamps: Vec<_> = bars.iter().map(|b| b.timestamp).collect();

        tracing::info!(
            bars = bars.len(),
            from = %timestamps[0],
            to = %timestamps[timestamps.len() - 1],
            capital = initial_equity,
            "Starting backtest"
        );

        let source = Arc::new(ReplaySource::new(bars));
        let state = PortfolioState::new(initial_equity, trading.max_per_trade, trading.planned_intervals);
        let mut bot = TradingLoop::from_config(
            &self.config,
            source,
            Box::new(PaperExchange::new(trading.commission_rate)),
            state,
        );

        let mut equity_curve = Vec::with_capacity(timestamps.len());
        let mut trades = Vec::new();
        let mut failed_orders = 0;

        for &now in &timestamps {
            match bot.run_cycle(now).await {
                CycleOutcome::Completed { trade, .. } => {
                    trades.extend(trade);
                    equity_curve.push(bot.state().equity);
                }
                CycleOutcome::ExecutionFailed { error, .. } => {
                    tracing::debug!(%now, %error, "Order failed during replay");
                    failed_orders += 1;
                    equity_curve.push(bot.state().equity);
                }
                CycleOutcome::Skipped { reason } => {
                    tracing::warn!(%now, %reason, "Replay cycle skipped");
                }
                CycleOutcome::NoNewData => {}
            }
        }

        let final_state = bot.into_state();
        let metrics = BacktestMetrics::from_run(
            initial_equity,
            &equity_curve,
            &trades,
            failed_orders,
            &final_state,
        );

        tracing::info!(
            buys = metrics.buys,
            stop_losses = metrics.stop_loss_exits,
            final_equity = metrics.final_equity,
            "Backtest complete: {:+.2}%",
            metrics.total_return_pct
        );

        Ok(metrics)
    }
}
