use chrono::{DateTime, Duration, Utc};

use crate::models::{PortfolioState, TradeKind};
use crate::persistence::TradeRecord;

/// Portfolio summary over the last reporting period
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub generated_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub asset: String,
    pub mark_price: f64,
    pub equity: f64,
    pub cash: f64,
    pub holdings: f64,
    pub average_entry_price: Option<f64>,
    pub week_start_equity: f64,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub total_trades: usize,
    pub accumulations: usize,
    pub exits: usize,
    pub fees: f64,
    pub realized_pnl: f64,
}

impl WeeklyReport {
    /// Summarize `state` marked at `mark_price`, counting only trades since the
    /// previous report (or the last seven days when there was none).
    ///
    /// The period is `[period_start, now)`: a trade filled at the instant a
    /// report is generated belongs to the next period, so consecutive reports
    /// never count it twice.
    pub fn build(
        state: &PortfolioState,
        trades: &[TradeRecord],
        now: DateTime<Utc>,
        mark_price: f64,
        asset: &str,
    ) -> Self {
        let period_start = state.last_report_at.unwrap_or(now - Duration::days(7));
        let in_period: Vec<&TradeRecord> = trades
            .iter()
            .filter(|t| t.timestamp >= period_start && t.timestamp < now)
            .collect();

        let equity = state.mark_to_market(mark_price);
        let pnl_usd = equity - state.week_start_equity;
        let pnl_pct = if state.week_start_equity > 0.0 {
            pnl_usd / state.week_start_equity * 100.0
        } else {
            0.0
        };

        let accumulations = in_period
            .iter()
            .filter(|t| t.kind == TradeKind::Accumulate)
            .count();

        Self {
            generated_at: now,
            period_start,
            asset: asset.to_string(),
            mark_price,
            equity,
            cash: state.budget.available_capital,
            holdings: state.holdings(),
            average_entry_price: state.position.as_ref().map(|p| p.average_entry_price),
            week_start_equity: state.week_start_equity,
            pnl_usd,
            pnl_pct,
            total_trades: in_period.len(),
            accumulations,
            exits: in_period.len() - accumulations,
            fees: in_period.iter().map(|t| t.fee).sum(),
            realized_pnl: in_period.iter().filter_map(|t| t.realized_pnl).sum(),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Weekly Trading Bot Report - P/L: {:+.2} USD ({:+.2}%)",
            self.pnl_usd, self.pnl_pct
        )
    }

    pub fn html_body(&self) -> String {
        let entry = self
            .average_entry_price
            .map(|p| format!("${:.2}", p))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            r#"<html>
  <body>
    <h2>Weekly Trading Bot Performance Summary</h2>
    <p>Period {start} to {end} (UTC).</p>
    <h3>Portfolio</h3>
    <ul>
      <li><strong>Portfolio value:</strong> ${equity:.2}</li>
      <li><strong>Holdings:</strong> {holdings:.6} {asset} at ${price:.2} (average entry {entry})</li>
      <li><strong>Cash:</strong> ${cash:.2}</li>
    </ul>
    <h3>This week</h3>
    <ul>
      <li><strong>P/L:</strong> {pnl_usd:+.2} USD ({pnl_pct:+.2}%)</li>
      <li><strong>Trades:</strong> {total} ({acc} accumulation, {exits} exit)</li>
      <li><strong>Realized P/L:</strong> {realized:+.2} USD</li>
      <li><strong>Fees paid:</strong> ${fees:.2}</li>
    </ul>
  </body>
</html>
"#,
            start = self.period_start.format("%Y-%m-%d %H:%M"),
            end = self.generated_at.format("%Y-%m-%d %H:%M"),
            equity = self.equity,
            holdings = self.holdings,
            asset = self.asset,
            price = self.mark_price,
            entry = entry,
            cash = self.cash,
            pnl_usd = self.pnl_usd,
            pnl_pct = self.pnl_pct,
            total = self.total_trades,
            acc = self.accumulations,
            exits = self.exits,
            realized = self.realized_pnl,
            fees = self.fees,
        )
    }

    /// Short Markdown summary for chat
    pub fn telegram_text(&self) -> String {
        format!(
            "*Weekly report*\nValue: ${:.2}\nP/L: {:+.2} USD ({:+.2}%)\nHoldings: {:.6} {} | Cash: ${:.2}\nTrades: {} ({} buys, {} exits) | Fees: ${:.2}",
            self.equity,
            self.pnl_usd,
            self.pnl_pct,
            self.holdings,
            self.asset,
            self.cash,
            self.total_trades,
            self.accumulations,
            self.exits,
            self.fees
        )
    }
}

/// True once `interval_days` have passed since the last report.
///
/// With no report yet the clock has not started and this is false.
pub fn report_due(last_report_at: Option<DateTime<Utc>>, now: DateTime<Utc>, interval_days: i64) -> bool {
    match last_report_at {
        Some(last) => now - last >= Duration::days(interval_days),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, TradeSide};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 12, 9, 0, 0).unwrap()
    }

    fn trade(days_ago: i64, kind: TradeKind, fee: f64, pnl: Option<f64>) -> TradeRecord {
        TradeRecord {
            timestamp: now() - Duration::days(days_ago),
            client_order_id: Uuid::new_v4(),
            side: if kind == TradeKind::Accumulate {
                TradeSide::Buy
            } else {
                TradeSide::Sell
            },
            kind,
            quantity: 0.01,
            price: 40_000.0,
            fee,
            quote_amount: 400.0,
            realized_pnl: pnl,
        }
    }

    fn state() -> PortfolioState {
        let mut state = PortfolioState::new(1000.0, 200.0, 10);
        state.budget.available_capital = 600.0;
        state.position = Some(Position {
            asset: "BTC".to_string(),
            quantity: 0.01,
            average_entry_price: 40_000.0,
            opened_at: now() - Duration::days(5),
            total_cost: 400.0,
        });
        state.last_report_at = Some(now() - Duration::days(7));
        state
    }

    #[test]
    fn test_pnl_against_week_start() {
        // 600 cash + 0.01 * 45000 = 1050 vs 1000 at week start
        let report = WeeklyReport::build(&state(), &[], now(), 45_000.0, "BTC");

        assert!((report.equity - 1050.0).abs() < 1e-9);
        assert!((report.pnl_usd - 50.0).abs() < 1e-9);
        assert!((report.pnl_pct - 5.0).abs() < 1e-9);
        assert_eq!(
            report.subject(),
            "Weekly Trading Bot Report - P/L: +50.00 USD (+5.00%)"
        );
    }

    #[test]
    fn test_negative_subject_sign() {
        let report = WeeklyReport::build(&state(), &[], now(), 30_000.0, "BTC");
        assert!(report.subject().contains("-100.00 USD (-10.00%)"));
    }

    #[test]
    fn test_counts_only_trades_in_period() {
        let trades = vec![
            trade(10, TradeKind::Accumulate, 1.0, None), // Before the period
            trade(6, TradeKind::Accumulate, 0.5, None),
            trade(3, TradeKind::Accumulate, 0.5, None),
            trade(1, TradeKind::StopLoss, 0.25, Some(-20.0)),
        ];

        let report = WeeklyReport::build(&state(), &trades, now(), 40_000.0, "BTC");

        assert_eq!(report.total_trades, 3);
        assert_eq!(report.accumulations, 2);
        assert_eq!(report.exits, 1);
        assert!((report.fees - 1.25).abs() < 1e-9);
        assert_eq!(report.realized_pnl, -20.0);
    }

    #[test]
    fn test_period_excludes_trade_at_report_instant() {
        let period_start = now() - Duration::days(7);
        let mut opening = trade(7, TradeKind::Accumulate, 0.5, None);
        opening.timestamp = period_start;
        let closing = trade(0, TradeKind::StopLoss, 0.25, Some(-20.0));

        let trades = vec![opening, closing];
        let report = WeeklyReport::build(&state(), &trades, now(), 40_000.0, "BTC");
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.accumulations, 1);
        assert_eq!(report.realized_pnl, 0.0);

        // The next period starts at the previous report and picks the exit up
        let mut next_state = state();
        next_state.last_report_at = Some(now());
        let next = WeeklyReport::build(&next_state, &trades, now() + Duration::days(7), 40_000.0, "BTC");
        assert_eq!(next.total_trades, 1);
        assert_eq!(next.exits, 1);
        assert!((next.fees - 0.25).abs() < 1e-9);
        assert_eq!(next.realized_pnl, -20.0);
    }

    #[test]
    fn test_bodies_mention_key_figures() {
        let report = WeeklyReport::build(&state(), &[], now(), 45_000.0, "BTC");

        let html = report.html_body();
        assert!(html.contains("$1050.00"));
        assert!(html.contains("0.010000 BTC"));

        let text = report.telegram_text();
        assert!(text.contains("+50.00 USD (+5.00%)"));
    }

    #[test]
    fn test_report_due() {
        let last = now() - Duration::days(7);
        assert!(report_due(Some(last), now(), 7));
        assert!(!report_due(Some(last + Duration::hours(1)), now(), 7));
        assert!(!report_due(None, now(), 7));
    }
}
