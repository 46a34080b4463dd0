pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::BacktestMetrics;
pub use runner::{BacktestRunner, ReplaySource};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
