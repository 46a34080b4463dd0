use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExecutionError;

/// OHLCV bar for the traded pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalKind {
    Accumulate,
    Hold,
    Exit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

/// Trading signal, recomputed every cycle and never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub confidence: f64, // 0.0 ..= 1.0
    pub generated_at: DateTime<Utc>,
    pub exit_reason: Option<ExitReason>,
    pub reason: String,
}

impl Signal {
    pub fn hold(confidence: f64, generated_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Hold,
            confidence,
            generated_at,
            exit_reason: None,
            reason: reason.into(),
        }
    }
}

/// Open holding in the traded asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub asset: String,
    pub quantity: f64,
    pub average_entry_price: f64, // Quantity-weighted fill price
    pub opened_at: DateTime<Utc>, // First entry time
    pub total_cost: f64,          // Quote spent including fees
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// Quote-currency capital available to the bot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub available_capital: f64,
    pub max_per_trade: f64,
}

impl Budget {
    pub fn new(available_capital: f64, max_per_trade: f64) -> Self {
        Self {
            available_capital,
            max_per_trade,
        }
    }

    /// Remove `amount` from the available capital.
    ///
    /// Fails instead of letting the balance go negative.
    pub fn debit(&mut self, amount: f64) -> Result<(), ExecutionError> {
        if amount < 0.0 || amount > self.available_capital {
            return Err(ExecutionError::InsufficientCapital {
                requested: amount,
                available: self.available_capital,
            });
        }
        self.available_capital -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: f64) {
        self.available_capital += amount.max(0.0);
    }
}

/// Accumulation plan: how many DCA buys are planned and how many happened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DcaSchedule {
    pub planned_intervals: u32,
    pub completed_intervals: u32,
}

impl DcaSchedule {
    pub fn new(planned_intervals: u32) -> Self {
        Self {
            planned_intervals,
            completed_intervals: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.planned_intervals
            .saturating_sub(self.completed_intervals)
    }
}

/// What the selector wants the executor to do this cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Buy { amount: f64 },
    SellAll { reason: ExitReason },
    Skip,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Confirmed fill reported by an order gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub client_order_id: Uuid,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeKind {
    Accumulate,
    StopLoss,
    TakeProfit,
}

impl From<ExitReason> for TradeKind {
    fn from(reason: ExitReason) -> Self {
        match reason {
            ExitReason::StopLoss => TradeKind::StopLoss,
            ExitReason::TakeProfit => TradeKind::TakeProfit,
        }
    }
}

/// A fill together with its effect on the portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTrade {
    pub fill: Fill,
    pub kind: TradeKind,
    /// Quote spent (buys) or received net of fees (sells)
    pub quote_amount: f64,
    pub realized_pnl: Option<f64>,
}

/// Everything the loop carries between cycles. Persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioState {
    pub position: Option<Position>,
    pub budget: Budget,
    pub schedule: DcaSchedule,
    pub last_bar_at: Option<DateTime<Utc>>,
    pub equity: f64,
    pub week_start_equity: f64,
    pub last_report_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioState {
    pub fn new(initial_capital: f64, max_per_trade: f64, planned_intervals: u32) -> Self {
        Self {
            position: None,
            budget: Budget::new(initial_capital, max_per_trade),
            schedule: DcaSchedule::new(planned_intervals),
            last_bar_at: None,
            equity: initial_capital,
            week_start_equity: initial_capital,
            last_report_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn holdings(&self) -> f64 {
        self.position.as_ref().map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Cash plus the position valued at `price`
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.budget.available_capital
            + self
                .position
                .as_ref()
                .map(|p| p.market_value(price))
                .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_debit_rejects_overdraft() {
        let mut budget = Budget::new(100.0, 50.0);

        assert!(budget.debit(60.0).is_ok());
        assert_eq!(budget.available_capital, 40.0);

        let result = budget.debit(40.01);
        assert!(matches!(
            result,
            Err(ExecutionError::InsufficientCapital { .. })
        ));
        assert_eq!(budget.available_capital, 40.0);
    }

    #[test]
    fn test_schedule_remaining_saturates() {
        let mut schedule = DcaSchedule::new(2);
        assert_eq!(schedule.remaining(), 2);

        schedule.completed_intervals = 5;
        assert_eq!(schedule.remaining(), 0);
    }

    #[test]
    fn test_mark_to_market() {
        let mut state = PortfolioState::new(1000.0, 100.0, 10);
        state.budget.available_capital = 800.0;
        state.position = Some(Position {
            asset: "BTC".to_string(),
            quantity: 2.0,
            average_entry_price: 100.0,
            opened_at: Utc::now(),
            total_cost: 200.0,
        });

        assert_eq!(state.mark_to_market(110.0), 1020.0);
        assert_eq!(state.holdings(), 2.0);
        assert_eq!(state.position.as_ref().unwrap().market_value(110.0), 220.0);
    }
}
