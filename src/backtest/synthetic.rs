use crate::models::PriceBar;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+0.4% per bar)
    Uptrend,
    /// Steady downtrend with noise (-0.4% per bar)
    Downtrend,
    /// Mean-reverting chop (±1% around the mean)
    Sideways,
    /// Large swings (±5% per bar)
    Volatile,
    /// Slow grind up, then a 40% collapse
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
        }
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown scenario '{}' (expected one of: uptrend, downtrend, sideways, volatile, crash)",
                    s
                )
            })
    }
}

/// Generates daily bars for backtesting
///
/// Same seed, same series: timestamps start at a fixed date so replays are
/// reproducible across runs.
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 30_000.0,
            base_volume: 25_000.0,
            start: Utc
                .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_bars` daily bars for `scenario`
    pub fn generate(&mut self, scenario: MarketScenario, num_bars: usize) -> Vec<PriceBar> {
        let mut bars = Vec::with_capacity(num_bars);
        let mut price = self.base_price;
        let crash_start = num_bars * 6 / 10;
        let crash_len = (num_bars * 15 / 100).max(1);

        for i in 0..num_bars {
            price = match scenario {
                MarketScenario::Uptrend => price * (1.0 + 0.004 + self.rng.gen_range(-0.01..0.01)),
                MarketScenario::Downtrend => price * (1.0 - 0.004 + self.rng.gen_range(-0.01..0.01)),
                MarketScenario::Sideways => {
                    let reversion = (self.base_price - price) * 0.1;
                    price + reversion + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => {
                    let next = price * (1.0 + self.rng.gen_range(-0.05..0.05));
                    next.max(self.base_price * 0.3)
                }
                MarketScenario::Crash => {
                    if i < crash_start {
                        price * (1.0 + 0.002 + self.rng.gen_range(-0.01..0.01))
                    } else if i < crash_start + crash_len {
                        // Compounds to roughly -40% over the crash window
                        let per_bar = 0.6_f64.powf(1.0 / crash_len as f64) - 1.0;
                        price * (1.0 + per_bar + self.rng.gen_range(-0.005..0.005))
                    } else {
                        price * (1.0 + self.rng.gen_range(-0.01..0.01))
                    }
                }
            };

            let timestamp = self.start + Duration::days(i as i64);
            bars.push(self.create_bar(price, timestamp));
        }

        bars
    }

    /// Realistic OHLC around a close
    fn create_bar(&mut self, close: f64, timestamp: DateTime<Utc>) -> PriceBar {
        let range_pct = 0.015; // ±1.5% intraday

        let high = close * (1.0 + self.rng.gen_range(0.0..range_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..range_pct));
        let open = (close * (1.0 + self.rng.gen_range(-range_pct..range_pct))).clamp(low, high);
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        PriceBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Uptrend, 365);

        assert_eq!(bars.len(), 365);
        let first = bars.first().unwrap().close;
        let last = bars.last().unwrap().close;
        assert!(last > first, "Uptrend should end higher: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Downtrend, 365);

        let first = bars.first().unwrap().close;
        let last = bars.last().unwrap().close;
        assert!(last < first, "Downtrend should end lower: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_sideways() {
        let mut gen = SyntheticDataGenerator::new(42);
        let base = gen.base_price();
        let bars = gen.generate(MarketScenario::Sideways, 365);

        for bar in &bars {
            assert!(
                bar.close > base * 0.9 && bar.close < base * 1.1,
                "Sideways should stay near base: {} vs {}",
                bar.close,
                base
            );
        }
    }

    #[test]
    fn test_crash_drops_from_peak() {
        let mut gen = SyntheticDataGenerator::new(7);
        let bars = gen.generate(MarketScenario::Crash, 200);

        let peak = bars.iter().map(|b| b.close).fold(f64::MIN, f64::max);
        let trough_after = bars[120..].iter().map(|b| b.close).fold(f64::MAX, f64::min);
        assert!(trough_after < peak * 0.7);
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(9).generate(MarketScenario::Volatile, 50);
        let b = SyntheticDataGenerator::new(9).generate(MarketScenario::Volatile, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_daily_sequential_timestamps() {
        let bars = SyntheticDataGenerator::new(42).generate(MarketScenario::Uptrend, 30);
        for pair in bars.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::days(1));
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        let bars = SyntheticDataGenerator::new(42).generate(MarketScenario::Volatile, 100);
        for bar in &bars {
            assert!(bar.high >= bar.close && bar.high >= bar.open);
            assert!(bar.low <= bar.close && bar.low <= bar.open);
        }
    }

    #[test]
    fn test_parse_scenario() {
        assert_eq!("Crash".parse::<MarketScenario>().unwrap(), MarketScenario::Crash);
        assert!("moon".parse::<MarketScenario>().is_err());
    }
}
