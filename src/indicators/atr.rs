/// Average True Range (ATR) indicator
///
/// True Range is the greatest of:
/// - High - Low
/// - Abs(High - Previous Close)
/// - Abs(Low - Previous Close)
///
/// Averaged with Wilder's smoothing. Used to size the stop-loss distance.
use crate::models::PriceBar;

fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect()
}

/// ATR at the last bar of the window, or None if the window is shorter
/// than `period + 1` bars
pub fn calculate_atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    calculate_atr_series(bars, period).last().copied()
}

/// ATR value for every bar from index `period` onwards
pub fn calculate_atr_series(bars: &[PriceBar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return Vec::new();
    }

    let trs = true_ranges(bars);
    let p = period as f64;

    let mut atr = trs[..period].iter().sum::<f64>() / p;
    let mut series = Vec::with_capacity(trs.len() - period + 1);
    series.push(atr);

    for tr in &trs[period..] {
        atr = (atr * (p - 1.0) + tr) / p;
        series.push(atr);
    }

    series
}

/// Price at which an open position is stopped out
pub fn stop_loss_level(average_entry_price: f64, atr: f64, multiplier: f64) -> f64 {
    average_entry_price - multiplier * atr
}

/// True once the close has fallen to or below `entry - multiplier * ATR`
pub fn is_stop_triggered(close: f64, average_entry_price: f64, atr: f64, multiplier: f64) -> bool {
    close <= stop_loss_level(average_entry_price, atr, multiplier)
}
