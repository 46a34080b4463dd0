use serde::Serialize;

use crate::models::{ExecutedTrade, PortfolioState, TradeKind};

/// Summary of a replay
#[derive(Debug, Clone, Serialize)]
pub struct BacktestMetrics {
    pub bars_processed: usize,
    pub buys: usize,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub failed_orders: usize,

    pub total_invested: f64, // Quote spent on buys, fees included
    pub total_fees: f64,
    pub realized_pnl: f64,

    pub initial_equity: f64,
    pub final_equity: f64,
    pub final_cash: f64,
    pub final_holdings: f64,
    pub total_return_pct: f64,

    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
}

impl BacktestMetrics {
    /// Build from the trades executed and the equity after each processed bar
    pub fn from_run(
        initial_equity: f64,
        equity_curve: &[f64],
        trades: &[ExecutedTrade],
        failed_orders: usize,
        final_state: &PortfolioState,
    ) -> Self {
        let count = |kind: TradeKind| trades.iter().filter(|t| t.kind == kind).count();

        let final_equity = equity_curve.last().copied().unwrap_or(initial_equity);
        let total_return_pct = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity * 100.0
        } else {
            0.0
        };
        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(equity_curve, initial_equity);

        Self {
            bars_processed: equity_curve.len(),
            buys: count(TradeKind::Accumulate),
            stop_loss_exits: count(TradeKind::StopLoss),
            take_profit_exits: count(TradeKind::TakeProfit),
            failed_orders,
            total_invested: trades
                .iter()
                .filter(|t| t.kind == TradeKind::Accumulate)
                .map(|t| t.quote_amount)
                .sum(),
            total_fees: trades.iter().map(|t| t.fill.fee).sum(),
            realized_pnl: trades.iter().filter_map(|t| t.realized_pnl).sum(),
            initial_equity,
            final_equity,
            final_cash: final_state.budget.available_capital,
            final_holdings: final_state.holdings(),
            total_return_pct,
            max_drawdown,
            max_drawdown_pct,
        }
    }

    /// Largest peak-to-trough fall of the equity curve
    fn calculate_drawdown(equity_curve: &[f64], initial_equity: f64) -> (f64, f64) {
        let mut peak = initial_equity;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &equity in equity_curve {
            if equity > peak {
                peak = equity;
            }

            let drawdown = peak - equity;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    pub fn print_report(&self) {
        println!("\n📊 Backtest results");
        println!("   Bars processed:    {}", self.bars_processed);
        println!(
            "   Trades:            {} buys, {} stop-loss, {} take-profit, {} failed",
            self.buys, self.stop_loss_exits, self.take_profit_exits, self.failed_orders
        );
        println!("   Invested:          ${:.2}", self.total_invested);
        println!("   Fees:              ${:.2}", self.total_fees);
        println!("   Realized P&L:      ${:+.2}", self.realized_pnl);
        println!(
            "   Equity:            ${:.2} -> ${:.2} ({:+.2}%)",
            self.initial_equity, self.final_equity, self.total_return_pct
        );
        println!(
            "   Final:             ${:.2} cash, {:.6} held",
            self.final_cash, self.final_holdings
        );
        println!(
            "   Max drawdown:      ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
    }
}
