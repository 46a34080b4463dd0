// Technical indicators module
// ATR for stop distance, SMA crossover for entries, RSI and sentiment for conviction

pub mod atr;
pub mod moving_average;
pub mod rsi;
pub mod sentiment;

pub use atr::{calculate_atr, calculate_atr_series, is_stop_triggered, stop_loss_level};
pub use moving_average::{calculate_sma, sma_crossover, Crossover};
pub use rsi::calculate_rsi;
pub use sentiment::{buy_conviction_adjustment, SentimentReading};
