use chrono::{Duration, TimeZone, Utc};
use dcabot::backtest::ReplaySource;
use dcabot::execution::PaperExchange;
use dcabot::indicators::{calculate_atr, stop_loss_level};
use dcabot::strategy::{dca_amount, select_action, EvaluatorConfig, SelectorConfig, SignalEvaluator};
use dcabot::{
    Action, BotConfig, Budget, DcaSchedule, ExitReason, PortfolioState, Position, PriceBar, Signal, SignalKind,
    TradingLoop,
};
use proptest::prelude::*;
use std::sync::Arc;

fn bars_from(closes: &[f64], range_pct: f64) -> Vec<PriceBar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            timestamp: start + Duration::days(i as i64),
            open: c,
            high: c * (1.0 + range_pct),
            low: c * (1.0 - range_pct),
            close: c,
            volume: 1.0,
        })
        .collect()
}

fn closes_from_returns(start: f64, returns: &[f64]) -> Vec<f64> {
    let mut price = start;
    returns
        .iter()
        .map(|r| {
            price = (price * (1.0 + r)).max(0.01);
            price
        })
        .collect()
}

proptest! {
    #[test]
    fn stop_fires_exactly_at_entry_minus_k_atr(
        entry in 50.0f64..50_000.0,
        drop_pct in 0.0f64..0.5,
        range_pct in 0.001f64..0.05,
        k in 0.5f64..5.0,
    ) {
        let mut closes = vec![entry; 30];
        closes.push(entry * (1.0 - drop_pct));
        let bars = bars_from(&closes, range_pct);

        let config = EvaluatorConfig { atr_multiplier: k, ..EvaluatorConfig::default() };
        let evaluator = SignalEvaluator::new(config.clone());
        let position = Position {
            asset: "BTC".to_string(),
            quantity: 1.0,
            average_entry_price: entry,
            opened_at: bars[0].timestamp,
            total_cost: entry,
        };
        let budget = Budget::new(1_000.0, 100.0);
        let now = bars[bars.len() - 1].timestamp;

        let signal = evaluator.evaluate(&bars, Some(&position), &budget, None, now);

        let atr = calculate_atr(&bars, config.atr_period).unwrap();
        let stop = stop_loss_level(entry, atr, k);
        let close = closes[closes.len() - 1];

        if close <= stop {
            prop_assert_eq!(signal.kind, SignalKind::Exit);
            prop_assert_eq!(signal.exit_reason, Some(ExitReason::StopLoss));
        } else {
            prop_assert_ne!(signal.exit_reason, Some(ExitReason::StopLoss));
        }
    }

    #[test]
    fn falling_market_always_exits(
        entry in 100.0f64..100_000.0,
        fall_pct in 0.005f64..0.05,
        k in 1.0f64..5.0,
    ) {
        let mut closes = vec![entry; 30];
        closes.extend(closes_from_returns(entry, &[-fall_pct; 400]));
        let bars = bars_from(&closes, 0.01);

        let evaluator = SignalEvaluator::new(EvaluatorConfig { atr_multiplier: k, ..EvaluatorConfig::default() });
        let window = evaluator.window_size();
        let position = Position {
            asset: "BTC".to_string(),
            quantity: 1.0,
            average_entry_price: entry,
            opened_at: bars[0].timestamp,
            total_cost: entry,
        };
        let budget = Budget::new(0.0, 100.0);

        let first_exit = (30..bars.len()).find(|&i| {
            let slice = &bars[(i + 1).saturating_sub(window)..=i];
            let signal = evaluator.evaluate(slice, Some(&position), &budget, None, slice[slice.len() - 1].timestamp);
            signal.exit_reason == Some(ExitReason::StopLoss)
        });

        let i = first_exit.expect("a falling market must trigger the stop");
        let slice = &bars[(i + 1).saturating_sub(window)..=i];
        let atr = calculate_atr(slice, EvaluatorConfig::default().atr_period).unwrap();
        prop_assert!(closes[i] <= stop_loss_level(entry, atr, k));
        prop_assert!(closes[i] < entry);
    }

    #[test]
    fn dca_amount_respects_limits(
        capital in 0.0f64..1_000_000.0,
        max_per_trade in 1.0f64..10_000.0,
        planned in 0u32..500,
        completed in 0u32..600,
    ) {
        let budget = Budget::new(capital, max_per_trade);
        let schedule = DcaSchedule { planned_intervals: planned, completed_intervals: completed };

        let amount = dca_amount(&budget, &schedule);
        prop_assert!(amount >= 0.0);
        prop_assert!(amount <= max_per_trade + 1e-9);
        prop_assert!(amount <= capital + 1e-9);
    }

    #[test]
    fn selector_is_deterministic(
        confidence in 0.0f64..=1.0,
        capital in 0.0f64..50_000.0,
        kind_idx in 0usize..3,
        has_position in any::<bool>(),
    ) {
        let kind = [SignalKind::Accumulate, SignalKind::Hold, SignalKind::Exit][kind_idx];
        let signal = Signal {
            kind,
            confidence,
            generated_at: Utc::now(),
            exit_reason: (kind == SignalKind::Exit).then_some(ExitReason::StopLoss),
            reason: "generated".to_string(),
        };
        let position = has_position.then(|| Position {
            asset: "BTC".to_string(),
            quantity: 0.1,
            average_entry_price: 30_000.0,
            opened_at: Utc::now(),
            total_cost: 3_000.0,
        });
        let budget = Budget::new(capital, 200.0);
        let schedule = DcaSchedule::new(52);
        let config = SelectorConfig { min_order_amount: 10.0, min_confidence: 0.3 };

        let a = select_action(&signal, position.as_ref(), &budget, &schedule, &config);
        let b = select_action(&signal, position.as_ref(), &budget, &schedule, &config);
        prop_assert_eq!(&a.action, &b.action);

        match a.action {
            Action::Buy { amount } => {
                prop_assert_eq!(kind, SignalKind::Accumulate);
                prop_assert!(amount >= 10.0 && amount <= capital);
            }
            Action::SellAll { .. } => prop_assert!(kind == SignalKind::Exit && has_position),
            Action::Skip => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn cash_never_goes_negative(
        returns in prop::collection::vec(-0.08f64..0.08, 30..150),
        max_per_trade in 50.0f64..2_000.0,
        planned in 1u32..60,
    ) {
        let closes = closes_from_returns(30_000.0, &returns);
        let bars = bars_from(&closes, 0.02);
        let timestamps: Vec<_> = bars.iter().map(|b| b.timestamp).collect();

        let mut config = BotConfig::default();
        config.trading.initial_capital = 5_000.0;
        config.trading.max_per_trade = max_per_trade;
        config.trading.planned_intervals = planned;
        config.strategy.use_sentiment = false;

        let state = PortfolioState::new(5_000.0, max_per_trade, planned);
        let mut bot = TradingLoop::from_config(
            &config,
            Arc::new(ReplaySource::new(bars)),
            Box::new(PaperExchange::new(config.trading.commission_rate)),
            state,
        );

        tokio_test::block_on(async {
            for now in timestamps {
                bot.run_cycle(now).await;
                let state = bot.state();
                assert!(state.budget.available_capital >= 0.0);
                assert!(state.holdings() >= 0.0);
                assert!(state.equity >= 0.0);
            }
        });
    }
}
