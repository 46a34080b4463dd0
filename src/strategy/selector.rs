use crate::config::BotConfig;
use crate::models::{Action, Budget, DcaSchedule, Decision, Position, Signal, SignalKind};

/// Limits applied when turning a signal into an action
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub min_order_amount: f64,
    pub min_confidence: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_order_amount: 10.0,
            min_confidence: 0.0,
        }
    }
}

impl From<&BotConfig> for SelectorConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            min_order_amount: config.trading.min_order_amount,
            min_confidence: config.strategy.min_confidence,
        }
    }
}

/// Dollar-cost-average sizing:
/// `min(max_per_trade, available_capital / remaining_planned_intervals)`
///
/// With no planned intervals left the remainder is spread over one buy.
pub fn dca_amount(budget: &Budget, schedule: &DcaSchedule) -> f64 {
    let remaining = schedule.remaining().max(1) as f64;
    budget
        .max_per_trade
        .min(budget.available_capital / remaining)
        .max(0.0)
}

/// Choose the action for this cycle.
///
/// Pure: the same inputs always produce the same decision.
pub fn select_action(
    signal: &Signal,
    position: Option<&Position>,
    budget: &Budget,
    schedule: &DcaSchedule,
    config: &SelectorConfig,
) -> Decision {
    match signal.kind {
        SignalKind::Accumulate => {
            if signal.confidence < config.min_confidence {
                return Decision {
                    action: Action::Skip,
                    reason: format!(
                        "Confidence {:.2} below minimum {:.2}",
                        signal.confidence, config.min_confidence
                    ),
                };
            }

            let amount = dca_amount(budget, schedule);
            if amount < config.min_order_amount || amount <= 0.0 {
                return Decision {
                    action: Action::Skip,
                    reason: format!(
                        "DCA amount ${:.2} below minimum order ${:.2}",
                        amount, config.min_order_amount
                    ),
                };
            }

            Decision {
                action: Action::Buy { amount },
                reason: format!(
                    "Accumulate ${:.2} ({} intervals remaining)",
                    amount,
                    schedule.remaining()
                ),
            }
        }

        SignalKind::Exit => match (position, signal.exit_reason) {
            (Some(position), Some(reason)) => Decision {
                action: Action::SellAll { reason },
                reason: format!("Exit {:.6} {} ({:?})", position.quantity, position.asset, reason),
            },
            (Some(_), None) => Decision {
                action: Action::Skip,
                reason: "Exit signal without a reason".to_string(),
            },
            (None, _) => Decision {
                action: Action::Skip,
                reason: "No position to exit".to_string(),
            },
        },

        SignalKind::Hold => Decision {
            action: Action::Skip,
            reason: format!("Hold: {}", signal.reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExitReason;
    use chrono::Utc;

    fn signal(kind: SignalKind, exit_reason: Option<ExitReason>) -> Signal {
        Signal {
            kind,
            confidence: 0.8,
            generated_at: Utc::now(),
            exit_reason,
            reason: "test".to_string(),
        }
    }

    fn position() -> Position {
        Position {
            asset: "BTC".to_string(),
            quantity: 0.5,
            average_entry_price: 100.0,
            opened_at: Utc::now(),
            total_cost: 50.0,
        }
    }

    #[test]
    fn test_dca_sizing_scenario() {
        // capital 1000, max 200, 5 remaining -> 200
        let budget = Budget::new(1000.0, 200.0);
        let schedule = DcaSchedule::new(5);

        let decision = select_action(
            &signal(SignalKind::Accumulate, None),
            None,
            &budget,
            &schedule,
            &SelectorConfig::default(),
        );
        assert_eq!(decision.action, Action::Buy { amount: 200.0 });
    }

    #[test]
    fn test_dca_sizing_spreads_capital() {
        // capital 1000, max 500, 10 remaining -> 100
        let budget = Budget::new(1000.0, 500.0);
        let schedule = DcaSchedule::new(10);
        assert_eq!(dca_amount(&budget, &schedule), 100.0);
    }

    #[test]
    fn test_exhausted_schedule_uses_remaining_capital() {
        let budget = Budget::new(150.0, 200.0);
        let mut schedule = DcaSchedule::new(3);
        schedule.completed_intervals = 3;
        assert_eq!(dca_amount(&budget, &schedule), 150.0);
    }

    #[test]
    fn test_skip_below_min_order() {
        let budget = Budget::new(5.0, 200.0);
        let decision = select_action(
            &signal(SignalKind::Accumulate, None),
            None,
            &budget,
            &DcaSchedule::new(1),
            &SelectorConfig::default(),
        );
        assert_eq!(decision.action, Action::Skip);
        assert!(decision.reason.contains("below minimum order"));
    }

    #[test]
    fn test_skip_low_confidence() {
        let config = SelectorConfig {
            min_confidence: 0.9,
            ..Default::default()
        };
        let decision = select_action(
            &signal(SignalKind::Accumulate, None),
            None,
            &Budget::new(1000.0, 200.0),
            &DcaSchedule::new(5),
            &config,
        );
        assert_eq!(decision.action, Action::Skip);
        assert!(decision.reason.contains("Confidence"));
    }

    #[test]
    fn test_exit_sells_all_with_position() {
        let pos = position();
        let decision = select_action(
            &signal(SignalKind::Exit, Some(ExitReason::StopLoss)),
            Some(&pos),
            &Budget::new(1000.0, 200.0),
            &DcaSchedule::new(5),
            &SelectorConfig::default(),
        );
        assert_eq!(
            decision.action,
            Action::SellAll {
                reason: ExitReason::StopLoss
            }
        );
    }

    #[test]
    fn test_exit_without_position_skips() {
        let decision = select_action(
            &signal(SignalKind::Exit, Some(ExitReason::StopLoss)),
            None,
            &Budget::new(1000.0, 200.0),
            &DcaSchedule::new(5),
            &SelectorConfig::default(),
        );
        assert_eq!(decision.action, Action::Skip);
        assert!(decision.reason.contains("No position"));
    }

    #[test]
    fn test_hold_skips() {
        let decision = select_action(
            &signal(SignalKind::Hold, None),
            Some(&position()),
            &Budget::new(1000.0, 200.0),
            &DcaSchedule::new(5),
            &SelectorConfig::default(),
        );
        assert_eq!(decision.action, Action::Skip);
        assert!(decision.reason.starts_with("Hold"));
    }

    #[test]
    fn test_deterministic() {
        let budget = Budget::new(777.0, 120.0);
        let schedule = DcaSchedule::new(9);
        let s = signal(SignalKind::Accumulate, None);
        let config = SelectorConfig::default();

        let first = select_action(&s, None, &budget, &schedule, &config);
        for _ in 0..10 {
            let again = select_action(&s, None, &budget, &schedule, &config);
            assert_eq!(again.action, first.action);
            assert_eq!(again.reason, first.reason);
        }
    }
}
