use std::sync::Arc;

use super::BarWindow;
use crate::api::MarketDataSource;
use crate::error::FetchError;
use crate::models::PriceBar;

/// Keeps the bar window for one pair up to date from a market data source
pub struct PriceFeed {
    source: Arc<dyn MarketDataSource>,
    symbol: String,
    window: BarWindow,
}

impl PriceFeed {
    pub fn new(source: Arc<dyn MarketDataSource>, symbol: impl Into<String>, window_size: usize) -> Self {
        Self {
            source,
            symbol: symbol.into(),
            window: BarWindow::new(window_size),
        }
    }

    /// Fetch the latest bars and append the new ones.
    ///
    /// Returns the number of bars added. The window is untouched on error.
    pub async fn refresh(&mut self) -> Result<usize, FetchError> {
        let bars = self
            .source
            .fetch_bars(&self.symbol, self.window.capacity())
            .await?;

        let added = self.window.extend(bars);

        if let Some(latest) = self.window.latest() {
            tracing::debug!(
                source = self.source.name(),
                symbol = %self.symbol,
                added,
                close = latest.close,
                bar_time = %latest.timestamp,
                "Refreshed bar window"
            );
        }

        Ok(added)
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.window.latest()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}
