use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "dcabot.toml";

/// Top-level bot configuration
///
/// Layered from (lowest to highest priority):
/// - built-in defaults
/// - TOML file (`--config`, or `dcabot.toml` when present)
/// - environment variables prefixed `DCABOT_`, nested with `__`
///   (e.g. `DCABOT_TRADING__SYMBOL=ETHUSDT`)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub trading: TradingSettings,
    pub strategy: StrategySettings,
    pub exchange: ExchangeSettings,
    pub notify: NotifySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub symbol: String,
    pub asset: String,
    pub poll_interval_secs: u64,
    pub initial_capital: f64,
    pub max_per_trade: f64,
    pub planned_intervals: u32,
    pub commission_rate: f64,
    pub min_order_amount: f64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            asset: "BTC".to_string(),
            poll_interval_secs: 60 * 60 * 24, // Daily bars, daily check
            initial_capital: 100_000.0,
            max_per_trade: 200.0,
            planned_intervals: 365,
            commission_rate: 0.002,
            min_order_amount: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub lookback_bars: usize,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub rsi_period: usize,
    pub take_profit_pct: Option<f64>,
    pub min_confidence: f64,
    pub use_sentiment: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            lookback_bars: 60,
            atr_period: 14,
            atr_multiplier: 3.0,
            short_ma_period: 10,
            long_ma_period: 20,
            rsi_period: 14,
            take_profit_pct: None,
            min_confidence: 0.0,
            use_sentiment: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarketSource {
    Bybit,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub source: MarketSource,
    pub base_url: String,
    pub category: String,
    pub interval: String,
    pub csv_path: String,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    pub sentiment_url: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            source: MarketSource::Bybit,
            base_url: "https://api.bybit.com".to_string(),
            category: "spot".to_string(),
            interval: "D".to_string(),
            csv_path: "btc_final_merged_data.csv".to_string(),
            request_timeout_secs: 10,
            rate_limit_per_minute: 60,
            sentiment_url: "https://api.alternative.me".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    #[serde(default = "default_email_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    pub from: String,
    pub to: String,
}

fn default_email_endpoint() -> String {
    "https://api.resend.com/emails".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub telegram: Option<TelegramSettings>,
    pub email: Option<EmailSettings>,
    pub report_interval_days: i64,
    pub queue_capacity: usize,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            telegram: None,
            email: None,
            report_interval_days: 7,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub state_path: String,
    pub trade_log_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_path: "portfolio_state.json".to_string(),
            trade_log_path: "trade_log.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "dcabot=info".to_string(),
        }
    }
}

impl BotConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix("DCABOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let mut cfg: BotConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        cfg.apply_env_credentials();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill notification credentials from the plain environment variables
    /// used by deployments (`TELEGRAM_BOT_TOKEN`, `EMAIL_API_KEY`, ...)
    fn apply_env_credentials(&mut self) {
        if self.notify.telegram.is_none() {
            if let (Ok(bot_token), Ok(chat_id)) = (
                std::env::var("TELEGRAM_BOT_TOKEN"),
                std::env::var("TELEGRAM_CHAT_ID"),
            ) {
                self.notify.telegram = Some(TelegramSettings {
                    bot_token,
                    chat_id,
                    api_base: default_telegram_api(),
                });
            }
        }

        if self.notify.email.is_none() {
            if let (Ok(api_key), Ok(from), Ok(to)) = (
                std::env::var("EMAIL_API_KEY"),
                std::env::var("EMAIL_FROM"),
                std::env::var("EMAIL_TO"),
            ) {
                self.notify.email = Some(EmailSettings {
                    endpoint: default_email_endpoint(),
                    api_key,
                    from,
                    to,
                });
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.trading;
        let s = &self.strategy;

        if t.initial_capital < 0.0 {
            anyhow::bail!("trading.initial_capital must be >= 0");
        }
        if t.max_per_trade <= 0.0 {
            anyhow::bail!("trading.max_per_trade must be > 0");
        }
        if t.poll_interval_secs == 0 {
            anyhow::bail!("trading.poll_interval_secs must be > 0");
        }
        if t.planned_intervals == 0 {
            anyhow::bail!("trading.planned_intervals must be > 0");
        }
        if !(0.0..1.0).contains(&t.commission_rate) {
            anyhow::bail!("trading.commission_rate must be in [0, 1)");
        }
        if s.atr_multiplier <= 0.0 {
            anyhow::bail!("strategy.atr_multiplier must be > 0");
        }
        if s.atr_period == 0 || s.short_ma_period == 0 {
            anyhow::bail!("indicator periods must be > 0");
        }
        if s.short_ma_period >= s.long_ma_period {
            anyhow::bail!(
                "strategy.short_ma_period ({}) must be below long_ma_period ({})",
                s.short_ma_period,
                s.long_ma_period
            );
        }
        if self.notify.report_interval_days <= 0 {
            anyhow::bail!("notify.report_interval_days must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BotConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.trading.symbol, "BTCUSDT");
        assert_eq!(cfg.strategy.atr_multiplier, 3.0);
        assert_eq!(cfg.exchange.source, MarketSource::Bybit);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[trading]
symbol = "ETHUSDT"
asset = "ETH"
max_per_trade = 50.0

[strategy]
atr_multiplier = 2.0
take_profit_pct = 0.05

[exchange]
source = "csv"
csv_path = "eth.csv"
"#
        )
        .unwrap();

        let cfg = BotConfig::load(Some(file.path())).unwrap();

        assert_eq!(cfg.trading.symbol, "ETHUSDT");
        assert_eq!(cfg.trading.max_per_trade, 50.0);
        // Untouched fields keep their defaults
        assert_eq!(cfg.trading.planned_intervals, 365);
        assert_eq!(cfg.strategy.atr_multiplier, 2.0);
        assert_eq!(cfg.strategy.take_profit_pct, Some(0.05));
        assert_eq!(cfg.exchange.source, MarketSource::Csv);
        assert_eq!(cfg.exchange.csv_path, "eth.csv");
    }

    #[test]
    fn test_rejects_inverted_moving_averages() {
        let mut cfg = BotConfig::default();
        cfg.strategy.short_ma_period = 30;
        cfg.strategy.long_ma_period = 20;

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("short_ma_period"));
    }

    #[test]
    fn test_rejects_zero_planned_intervals() {
        let mut cfg = BotConfig::default();
        cfg.trading.planned_intervals = 0;
        assert!(cfg.validate().is_err());
    }
}
