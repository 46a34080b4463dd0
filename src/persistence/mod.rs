pub mod trade_log;

pub use trade_log::{TradeLog, TradeRecord};

use crate::models::PortfolioState;
use crate::Result;
use std::path::{Path, PathBuf};

/// JSON file holding the portfolio between runs
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// crash mid-write never leaves a truncated state file behind.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state; `None` when nothing has been saved yet
    pub async fn load(&self) -> Result<Option<PortfolioState>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: PortfolioState = serde_json::from_str(&raw)?;

        tracing::debug!(
            path = %self.path.display(),
            cash = state.budget.available_capital,
            holdings = state.holdings(),
            "Loaded portfolio state"
        );

        Ok(Some(state))
    }

    /// Load the saved state or start from `fresh`
    pub async fn load_or(&self, fresh: PortfolioState) -> Result<PortfolioState> {
        Ok(self.load().await?.unwrap_or(fresh))
    }

    pub async fn save(&self, state: &PortfolioState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use chrono::Utc;

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        assert!(store.load().await.unwrap().is_none());

        let fresh = PortfolioState::new(1000.0, 100.0, 10);
        let state = store.load_or(fresh.clone()).await.unwrap();
        assert_eq!(state, fresh);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        let mut state = PortfolioState::new(1000.0, 100.0, 10);
        state.budget.available_capital = 900.0;
        state.schedule.completed_intervals = 1;
        state.last_bar_at = Some(Utc::now());
        state.position = Some(Position {
            asset: "BTC".to_string(),
            quantity: 0.002,
            average_entry_price: 50_000.0,
            opened_at: Utc::now(),
            total_cost: 100.0,
        });

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded, state);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = PortfolioState::new(1000.0, 100.0, 10);
        store.save(&state).await.unwrap();

        state.budget.available_capital = 1.0;
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.budget.available_capital, 1.0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::new(path);
        assert!(store.load().await.is_err());
    }
}
