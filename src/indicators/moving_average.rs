/// Simple Moving Average over the last `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Short/long SMA pair at the latest bar and the bar before it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover {
    pub short_prev: f64,
    pub long_prev: f64,
    pub short_now: f64,
    pub long_now: f64,
}

impl Crossover {
    /// Short average crossed from at-or-below to above the long average
    pub fn is_bullish(&self) -> bool {
        self.short_prev <= self.long_prev && self.short_now > self.long_now
    }

    pub fn long_rising(&self) -> bool {
        self.long_now > self.long_prev
    }
}

/// Compute the SMA crossover state; needs `long + 1` values
pub fn sma_crossover(closes: &[f64], short: usize, long: usize) -> Option<Crossover> {
    if closes.len() < long + 1 {
        return None;
    }

    let prev = &closes[..closes.len() - 1];
    Some(Crossover {
        short_prev: calculate_sma(prev, short)?,
        long_prev: calculate_sma(prev, long)?,
        short_now: calculate_sma(closes, short)?,
        long_now: calculate_sma(closes, long)?,
    })
}
