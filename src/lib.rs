// Core modules
pub mod api;
pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod report;
pub mod strategy;

// Re-export commonly used types
pub use config::BotConfig;
pub use engine::{CycleOutcome, TradingLoop};
pub use error::{ExecutionError, FetchError, NotificationError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
