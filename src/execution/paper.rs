use async_trait::async_trait;

use super::executor::{OrderGateway, OrderRequest};
use crate::error::ExecutionError;
use crate::models::{Fill, TradeSide};

/// Simulated venue: fills every order at its reference price, minus commission
#[derive(Debug, Clone)]
pub struct PaperExchange {
    commission_rate: f64,
}

impl PaperExchange {
    pub fn new(commission_rate: f64) -> Self {
        Self { commission_rate }
    }
}

#[async_trait]
impl OrderGateway for PaperExchange {
    async fn submit(&self, order: &OrderRequest) -> Result<Fill, ExecutionError> {
        let price = order.reference_price;
        if !(price > 0.0) {
            return Err(ExecutionError::Rejected {
                client_order_id: order.client_order_id,
                reason: format!("invalid reference price {}", price),
            });
        }

        let (quantity, fee) = match order.side {
            TradeSide::Buy => {
                if !(order.quote_amount > 0.0) {
                    return Err(ExecutionError::Rejected {
                        client_order_id: order.client_order_id,
                        reason: format!("invalid quote amount {}", order.quote_amount),
                    });
                }
                let fee = order.quote_amount * self.commission_rate;
                ((order.quote_amount - fee) / price, fee)
            }
            TradeSide::Sell => {
                if !(order.base_quantity > 0.0) {
                    return Err(ExecutionError::Rejected {
                        client_order_id: order.client_order_id,
                        reason: format!("invalid quantity {}", order.base_quantity),
                    });
                }
                let fee = order.base_quantity * price * self.commission_rate;
                (order.base_quantity, fee)
            }
        };

        tracing::debug!(
            client_order_id = %order.client_order_id,
            side = ?order.side,
            quantity,
            price,
            fee,
            "Paper fill"
        );

        Ok(Fill {
            client_order_id: order.client_order_id,
            side: order.side,
            quantity,
            price,
            fee,
            filled_at: order.requested_at,
        })
    }

    fn name(&self) -> &str {
        "paper"
    }
}
