use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

use super::MarketDataSource;
use crate::error::FetchError;
use crate::models::PriceBar;

/// Reads daily bars from a local CSV export
///
/// Header names are matched case-insensitively; the time column may be called
/// `timestamp`, `date` or `time`. The file is re-read on every fetch so an
/// external job can keep appending rows.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    path: PathBuf,
}

impl CsvBarSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every bar in the file, sorted oldest first
    pub fn load_all(&self) -> Result<Vec<PriceBar>, FetchError> {
        read_bars(&self.path)
    }
}

pub fn read_bars(path: &Path) -> Result<Vec<PriceBar>, FetchError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let column = |names: &[&str]| -> Result<usize, FetchError> {
        headers
            .iter()
            .position(|h| names.contains(&h.as_str()))
            .ok_or_else(|| FetchError::Malformed(format!("missing column {}", names[0])))
    };

    let time_col = column(&["timestamp", "date", "time"])?;
    let open_col = column(&["open"])?;
    let high_col = column(&["high"])?;
    let low_col = column(&["low"])?;
    let close_col = column(&["close"])?;
    let volume_col = column(&["volume"]).ok();

    let mut bars = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let number = |col: usize| -> Result<f64, FetchError> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>().map_err(|e| {
                FetchError::Malformed(format!("row {} column {}: '{}' ({})", line + 2, col, raw, e))
            })
        };

        let timestamp = parse_timestamp(record.get(time_col).unwrap_or(""))?;
        bars.push(PriceBar {
            timestamp,
            open: number(open_col)?,
            high: number(high_col)?,
            low: number(low_col)?,
            close: number(close_col)?,
            volume: match volume_col {
                Some(col) => number(col)?,
                None => 0.0,
            },
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or epoch milliseconds
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FetchError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(ms) = raw.parse::<i64>() {
        if let Some(ts) = Utc.timestamp_millis_opt(ms).single() {
            return Ok(ts);
        }
    }
    Err(FetchError::Malformed(format!("unrecognised timestamp '{}'", raw)))
}

#[async_trait]
impl MarketDataSource for CsvBarSource {
    async fn fetch_bars(&self, _symbol: &str, limit: usize) -> Result<Vec<PriceBar>, FetchError> {
        let mut bars = self.load_all()?;
        if bars.is_empty() {
            return Err(FetchError::Empty);
        }
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
