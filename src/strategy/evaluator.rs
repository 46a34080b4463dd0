use chrono::{DateTime, Utc};

use crate::config::StrategySettings;
use crate::indicators::{
    buy_conviction_adjustment, calculate_atr, calculate_rsi, is_stop_triggered, sma_crossover,
    stop_loss_level, SentimentReading,
};
use crate::models::{Budget, ExitReason, Position, PriceBar, Signal, SignalKind};

/// Configuration for signal evaluation
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub atr_period: usize,
    pub atr_multiplier: f64, // k in `entry - k * ATR`
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub rsi_period: usize,
    pub take_profit_pct: Option<f64>,
    pub lookback_bars: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from(&StrategySettings::default())
    }
}

impl From<&StrategySettings> for EvaluatorConfig {
    fn from(s: &StrategySettings) -> Self {
        Self {
            atr_period: s.atr_period,
            atr_multiplier: s.atr_multiplier,
            short_ma_period: s.short_ma_period,
            long_ma_period: s.long_ma_period,
            rsi_period: s.rsi_period,
            take_profit_pct: s.take_profit_pct,
            lookback_bars: s.lookback_bars,
        }
    }
}

/// Turns a window of bars plus the current position into a Signal
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: EvaluatorConfig,
}

impl SignalEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Bars the window must hold for every indicator to be defined
    pub fn window_size(&self) -> usize {
        let c = &self.config;
        let needed = (c.long_ma_period + 1)
            .max(c.atr_period + 1)
            .max(c.rsi_period + 1);
        c.lookback_bars.max(needed)
    }

    /// Evaluate the latest bar of `bars`.
    ///
    /// Order: stop-loss, take-profit, bullish crossover, hold.
    pub fn evaluate(
        &self,
        bars: &[PriceBar],
        position: Option<&Position>,
        budget: &Budget,
        sentiment: Option<&SentimentReading>,
        now: DateTime<Utc>,
    ) -> Signal {
        let Some(latest) = bars.last() else {
            return Signal::hold(0.0, now, "No price data");
        };
        let close = latest.close;

        if let Some(position) = position {
            if let Some(atr) = calculate_atr(bars, self.config.atr_period) {
                let entry = position.average_entry_price;
                if is_stop_triggered(close, entry, atr, self.config.atr_multiplier) {
                    return Signal {
                        kind: SignalKind::Exit,
                        confidence: 1.0,
                        generated_at: now,
                        exit_reason: Some(ExitReason::StopLoss),
                        reason: format!(
                            "Close ${:.2} at or below stop ${:.2} (entry ${:.2} - {}x ATR ${:.2})",
                            close,
                            stop_loss_level(entry, atr, self.config.atr_multiplier),
                            entry,
                            self.config.atr_multiplier,
                            atr
                        ),
                    };
                }
            }

            if let Some(tp) = self.config.take_profit_pct {
                let target = position.average_entry_price * (1.0 + tp);
                if close >= target {
                    return Signal {
                        kind: SignalKind::Exit,
                        confidence: 1.0,
                        generated_at: now,
                        exit_reason: Some(ExitReason::TakeProfit),
                        reason: format!(
                            "Close ${:.2} reached take-profit ${:.2} (+{:.1}%)",
                            close,
                            target,
                            tp * 100.0
                        ),
                    };
                }
            }
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let crossover = sma_crossover(
            &closes,
            self.config.short_ma_period,
            self.config.long_ma_period,
        );

        match crossover {
            Some(cross) if cross.is_bullish() => {
                if budget.available_capital <= 0.0 {
                    return Signal::hold(0.5, now, "Bullish crossover but no capital left");
                }

                let rsi = calculate_rsi(&closes, self.config.rsi_period);
                let confidence = buy_confidence(cross.long_rising(), rsi, sentiment);

                tracing::debug!(
                    short = cross.short_now,
                    long = cross.long_now,
                    ?rsi,
                    confidence,
                    "Bullish SMA crossover"
                );

                Signal {
                    kind: SignalKind::Accumulate,
                    confidence,
                    generated_at: now,
                    exit_reason: None,
                    reason: format!(
                        "SMA{} ${:.2} crossed above SMA{} ${:.2}",
                        self.config.short_ma_period,
                        cross.short_now,
                        self.config.long_ma_period,
                        cross.long_now
                    ),
                }
            }
            Some(_) => Signal::hold(0.5, now, "No crossover"),
            None => Signal::hold(
                0.5,
                now,
                format!(
                    "Collecting data ({}/{} bars)",
                    bars.len(),
                    self.config.long_ma_period + 1
                ),
            ),
        }
    }
}

/// Rule-based conviction for an accumulation, mapped to [0, 1]
///
/// Starts at 1.0, trend +/-0.2, sentiment extremes +/-0.3,
/// RSI over-extension -0.1 or oversold +0.1, clamped to [0, 1.5].
fn buy_confidence(
    long_rising: bool,
    rsi: Option<f64>,
    sentiment: Option<&SentimentReading>,
) -> f64 {
    let mut multiplier: f64 = 1.0;

    multiplier += if long_rising { 0.2 } else { -0.2 };

    if let Some(reading) = sentiment {
        multiplier += buy_conviction_adjustment(reading.value);
    }

    match rsi {
        Some(r) if r >= 75.0 => multiplier -= 0.1,
        Some(r) if r <= 30.0 => multiplier += 0.1,
        _ => {}
    }

    multiplier.clamp(0.0, 1.5) / 1.5
}
