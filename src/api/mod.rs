pub mod bybit;
pub mod csv_file;
pub mod fear_greed;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::indicators::SentimentReading;
use crate::models::PriceBar;

pub use bybit::BybitClient;
pub use csv_file::CsvBarSource;
pub use fear_greed::FearGreedClient;

/// Source of OHLCV history for one pair
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `limit` bars, oldest first
    async fn fetch_bars(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, FetchError>;

    fn name(&self) -> &str;
}

/// Source of a market-wide sentiment reading
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch_sentiment(&self) -> Result<SentimentReading, FetchError>;
}
