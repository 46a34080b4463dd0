use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{ExecutedTrade, TradeKind, TradeSide};
use crate::Result;

/// One row of the trade log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub client_order_id: Uuid,
    pub side: TradeSide,
    pub kind: TradeKind,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub quote_amount: f64,
    pub realized_pnl: Option<f64>,
}

impl From<&ExecutedTrade> for TradeRecord {
    fn from(trade: &ExecutedTrade) -> Self {
        Self {
            timestamp: trade.fill.filled_at,
            client_order_id: trade.fill.client_order_id,
            side: trade.fill.side,
            kind: trade.kind,
            quantity: trade.fill.quantity,
            price: trade.fill.price,
            fee: trade.fill.fee,
            quote_amount: trade.quote_amount,
            realized_pnl: trade.realized_pnl,
        }
    }
}

/// Append-only CSV log of executed trades
#[derive(Debug, Clone)]
pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, writing the header if the file is new or empty
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }

    pub fn load_all(&self) -> Result<Vec<TradeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Records at or after `since`
    pub fn load_since(&self, since: DateTime<Utc>) -> Result<Vec<TradeRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.timestamp >= since)
            .collect())
    }
}
