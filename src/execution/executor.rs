use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::models::{
    Action, ExecutedTrade, Fill, PortfolioState, Position, TradeKind, TradeSide,
};

// Relative slack allowed between the quote requested and the quote a fill reports
const QUOTE_TOLERANCE: f64 = 1e-9;

/// Market order handed to a gateway
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub quote_amount: f64,  // Buys: quote to spend, fee included
    pub base_quantity: f64, // Sells: quantity to sell
    pub reference_price: f64,
    pub requested_at: DateTime<Utc>,
}

/// Where orders go. Implementations must report the fill for the given
/// `client_order_id` or an error; they never retry on their own.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit(&self, order: &OrderRequest) -> Result<Fill, ExecutionError>;

    fn name(&self) -> &str;
}

/// Turns actions into orders and applies confirmed fills to the portfolio
pub struct Executor {
    gateway: Box<dyn OrderGateway>,
    symbol: String,
    asset: String,
}

impl Executor {
    pub fn new(gateway: Box<dyn OrderGateway>, symbol: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            gateway,
            symbol: symbol.into(),
            asset: asset.into(),
        }
    }

    /// Execute `action` against `state`.
    ///
    /// Position, budget and schedule change only after a valid fill, and all
    /// three change together. On error `state` is exactly as it was.
    pub async fn execute(
        &self,
        action: &Action,
        state: &mut PortfolioState,
        reference_price: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<ExecutedTrade>, ExecutionError> {
        match action {
            Action::Skip => Ok(None),
            Action::Buy { amount } => self.buy(*amount, state, reference_price, at).await.map(Some),
            Action::SellAll { reason } => self
                .sell_all(TradeKind::from(*reason), state, reference_price, at)
                .await
                .map(Some),
        }
    }

    async fn buy(
        &self,
        amount: f64,
        state: &mut PortfolioState,
        reference_price: f64,
        at: DateTime<Utc>,
    ) -> Result<ExecutedTrade, ExecutionError> {
        if !(amount > 0.0) || amount > state.budget.available_capital {
            return Err(ExecutionError::InsufficientCapital {
                requested: amount,
                available: state.budget.available_capital,
            });
        }

        let order = OrderRequest {
            client_order_id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            side: TradeSide::Buy,
            quote_amount: amount,
            base_quantity: 0.0,
            reference_price,
            requested_at: at,
        };

        tracing::info!(
            client_order_id = %order.client_order_id,
            gateway = self.gateway.name(),
            amount,
            reference_price,
            "Submitting buy"
        );

        let fill = self.gateway.submit(&order).await?;
        validate_fill(&order, &fill)?;

        let spent = fill.quantity * fill.price + fill.fee;
        if spent > amount * (1.0 + QUOTE_TOLERANCE) + QUOTE_TOLERANCE {
            return Err(ExecutionError::InvalidFill(format!(
                "order {} spent ${:.2}, requested ${:.2}",
                fill.client_order_id, spent, amount
            )));
        }
        let spent = spent.min(amount);

        let mut budget = state.budget.clone();
        budget
            .debit(spent)
            .map_err(|e| ExecutionError::InvalidFill(e.to_string()))?;

        let position = match &state.position {
            Some(existing) => {
                let quantity = existing.quantity + fill.quantity;
                Position {
                    asset: existing.asset.clone(),
                    quantity,
                    average_entry_price: (existing.quantity * existing.average_entry_price
                        + fill.quantity * fill.price)
                        / quantity,
                    opened_at: existing.opened_at,
                    total_cost: existing.total_cost + spent,
                }
            }
            None => Position {
                asset: self.asset.clone(),
                quantity: fill.quantity,
                average_entry_price: fill.price,
                opened_at: fill.filled_at,
                total_cost: spent,
            },
        };

        let mut schedule = state.schedule.clone();
        schedule.completed_intervals = schedule.completed_intervals.saturating_add(1);

        // Commit
        state.position = Some(position);
        state.budget = budget;
        state.schedule = schedule;

        tracing::info!(
            client_order_id = %fill.client_order_id,
            quantity = fill.quantity,
            price = fill.price,
            fee = fill.fee,
            cash = state.budget.available_capital,
            "Buy filled"
        );

        Ok(ExecutedTrade {
            fill,
            kind: TradeKind::Accumulate,
            quote_amount: spent,
            realized_pnl: None,
        })
    }

    async fn sell_all(
        &self,
        kind: TradeKind,
        state: &mut PortfolioState,
        reference_price: f64,
        at: DateTime<Utc>,
    ) -> Result<ExecutedTrade, ExecutionError> {
        let position = state.position.as_ref().ok_or(ExecutionError::NoPosition)?;

        let order = OrderRequest {
            client_order_id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            side: TradeSide::Sell,
            quote_amount: 0.0,
            base_quantity: position.quantity,
            reference_price,
            requested_at: at,
        };

        tracing::info!(
            client_order_id = %order.client_order_id,
            gateway = self.gateway.name(),
            quantity = position.quantity,
            reference_price,
            ?kind,
            "Submitting sell"
        );

        let fill = self.gateway.submit(&order).await?;
        validate_fill(&order, &fill)?;

        let tolerance = position.quantity * QUOTE_TOLERANCE;
        if (fill.quantity - position.quantity).abs() > tolerance {
            return Err(ExecutionError::InvalidFill(format!(
                "order {} filled {} of {}",
                fill.client_order_id, fill.quantity, position.quantity
            )));
        }

        let proceeds = fill.quantity * fill.price - fill.fee;
        if proceeds < 0.0 {
            return Err(ExecutionError::InvalidFill(format!(
                "order {} fee ${:.2} exceeds gross proceeds",
                fill.client_order_id, fill.fee
            )));
        }
        let realized_pnl = proceeds - position.total_cost;

        let mut budget = state.budget.clone();
        budget.credit(proceeds);

        // Commit
        state.position = None;
        state.budget = budget;

        tracing::info!(
            client_order_id = %fill.client_order_id,
            quantity = fill.quantity,
            price = fill.price,
            proceeds,
            realized_pnl,
            "Position closed"
        );

        Ok(ExecutedTrade {
            fill,
            kind,
            quote_amount: proceeds,
            realized_pnl: Some(realized_pnl),
        })
    }
}

fn validate_fill(order: &OrderRequest, fill: &Fill) -> Result<(), ExecutionError> {
    if fill.client_order_id != order.client_order_id {
        return Err(ExecutionError::InvalidFill(format!(
            "fill for {} does not match order {}",
            fill.client_order_id, order.client_order_id
        )));
    }
    if fill.side != order.side {
        return Err(ExecutionError::InvalidFill(format!(
            "order {} filled on the wrong side",
            order.client_order_id
        )));
    }
    if !(fill.quantity > 0.0) || !(fill.price > 0.0) || !(fill.fee >= 0.0) {
        return Err(ExecutionError::InvalidFill(format!(
            "order {} has quantity {}, price {}, fee {}",
            order.client_order_id, fill.quantity, fill.price, fill.fee
        )));
    }
    Ok(())
}
