use async_trait::async_trait;
use chrono::{DateTime, Months, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::MarketDataSource;
use crate::config::ExchangeSettings;
use crate::error::FetchError;
use crate::models::PriceBar;

const MAX_KLINE_LIMIT: usize = 1000;

type KlineRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Bybit v5 public market data client
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    category: String,
    interval: String,
    span: KlineSpan,
    rate_limiter: Arc<KlineRateLimiter>,
}

/// Length of one kline: "1".."720" minutes, "D", "W" or "M"
#[derive(Debug, Clone, Copy, PartialEq)]
enum KlineSpan {
    Minutes(i64),
    Days(i64),
    Month,
}

impl KlineSpan {
    fn parse(interval: &str) -> Option<Self> {
        match interval {
            "D" => Some(Self::Days(1)),
            "W" => Some(Self::Days(7)),
            "M" => Some(Self::Month),
            minutes => minutes.parse::<i64>().ok().filter(|m| *m > 0).map(Self::Minutes),
        }
    }

    /// When a kline opened at `start` is final
    fn close_of(self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Minutes(m) => start.checked_add_signed(chrono::Duration::minutes(m)),
            Self::Days(d) => start.checked_add_signed(chrono::Duration::days(d)),
            Self::Month => start.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    ret_code: i64,
    ret_msg: String,
    result: Option<KlineResult>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>, // [startTime, open, high, low, close, volume, turnover], newest first
}

impl BybitClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let per_minute = NonZeroU32::new(settings.rate_limit_per_minute.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let span = KlineSpan::parse(&settings.interval).ok_or_else(|| {
            FetchError::Malformed(format!("unsupported kline interval '{}'", settings.interval))
        })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            category: settings.category.clone(),
            interval: settings.interval.clone(),
            span,
            rate_limiter,
        })
    }

    /// Fetch up to `limit` closed klines, oldest first.
    ///
    /// Bybit always includes the still-forming candle as the newest row. It is
    /// dropped, otherwise the window would keep that partial snapshot and
    /// reject the final version of the same bar later.
    pub async fn get_klines(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, FetchError> {
        self.get_klines_at(symbol, limit, Utc::now()).await
    }

    async fn get_klines_at(
        &self,
        symbol: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, FetchError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v5/market/kline", self.base_url);
        let limit = limit.clamp(1, MAX_KLINE_LIMIT - 1);
        let requested = (limit + 1).to_string();

        let response: ApiResponse = self
            .client
            .get(&url)
            .query(&[
                ("category", self.category.as_str()),
                ("symbol", symbol),
                ("interval", self.interval.as_str()),
                ("limit", requested.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.ret_code != 0 {
            return Err(FetchError::Api {
                code: response.ret_code,
                message: response.ret_msg,
            });
        }

        let rows = response.result.map(|r| r.list).unwrap_or_default();
        let mut bars = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>, _>>()?;

        bars.sort_by_key(|b| b.timestamp);

        let fetched = bars.len();
        let bars = closed_bars(bars, self.span, now, limit);
        if bars.len() < fetched {
            tracing::debug!(symbol, dropped = fetched - bars.len(), "Trimmed klines to closed bars");
        }

        tracing::debug!(symbol, bars = bars.len(), "Fetched klines from Bybit");
        Ok(bars)
    }
}

/// Keep the newest `limit` bars whose interval has ended by `now`
fn closed_bars(bars: Vec<PriceBar>, span: KlineSpan, now: DateTime<Utc>, limit: usize) -> Vec<PriceBar> {
    let mut closed: Vec<PriceBar> = bars
        .into_iter()
        .filter(|b| span.close_of(b.timestamp).is_some_and(|close| close <= now))
        .collect();
    let excess = closed.len().saturating_sub(limit);
    closed.drain(..excess);
    closed
}

fn parse_kline(row: &[String]) -> Result<PriceBar, FetchError> {
    if row.len() < 6 {
        return Err(FetchError::Malformed(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let field = |i: usize| -> Result<f64, FetchError> {
        row[i]
            .parse::<f64>()
            .map_err(|e| FetchError::Malformed(format!("field {} '{}': {}", i, row[i], e)))
    };

    let start_ms: i64 = row[0]
        .parse()
        .map_err(|e| FetchError::Malformed(format!("start time '{}': {}", row[0], e)))?;
    let timestamp = Utc
        .timestamp_millis_opt(start_ms)
        .single()
        .ok_or_else(|| FetchError::Malformed(format!("start time out of range: {}", start_ms)))?;

    Ok(PriceBar {
        timestamp,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

#[async_trait]
impl MarketDataSource for BybitClient {
    async fn fetch_bars(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, FetchError> {
        let bars = self.get_klines(symbol, limit).await?;
        if bars.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "bybit"
    }
}
