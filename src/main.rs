use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dcabot::api::{BybitClient, CsvBarSource, FearGreedClient, MarketDataSource, SentimentSource};
use dcabot::config::{BotConfig, MarketSource};
use dcabot::engine::TradingLoop;
use dcabot::execution::PaperExchange;
use dcabot::models::PortfolioState;
use dcabot::notify::{EmailNotifier, NotificationHub, Notifier, TelegramNotifier};
use dcabot::persistence::{StateStore, TradeLog};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

const NOTIFY_FLUSH_TIMEOUT_SECS: u64 = 15;

#[derive(Parser)]
#[command(name = "dcabot", version, about = "DCA accumulation bot with an ATR stop-loss")]
struct Cli {
    /// TOML configuration file (defaults to ./dcabot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading loop until Ctrl-C (default)
    Run,
    /// Send the weekly report now
    Report,
    /// Print the saved portfolio state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = BotConfig::load(cli.config.as_deref())?;
    setup_logging(&config.logging.filter);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Report => report(config).await,
        Command::Status => status(config).await,
    }
}

fn setup_logging(default_filter: &str) {
    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: BotConfig) -> Result<()> {
    tracing::info!("🚀 dcabot starting");
    tracing::info!("📊 Configuration:");
    tracing::info!("  Pair: {} ({:?} data)", config.trading.symbol, config.exchange.source);
    tracing::info!("  Poll interval: {}s", config.trading.poll_interval_secs);
    tracing::info!(
        "  DCA: max ${:.2} per buy over {} intervals",
        config.trading.max_per_trade,
        config.trading.planned_intervals
    );
    tracing::info!(
        "  Stop-loss: entry - {} x ATR({})",
        config.strategy.atr_multiplier,
        config.strategy.atr_period
    );

    let (hub, dispatcher) = build_notifications(&config);
    let mut bot = build_loop(&config, hub.clone()).await?;

    bot.announce_startup();
    bot.run_until(
        Duration::from_secs(config.trading.poll_interval_secs),
        shutdown_signal(),
    )
    .await;

    drop(bot);
    flush_notifications(hub, dispatcher).await;

    tracing::info!("👋 dcabot stopped");
    Ok(())
}

async fn report(config: BotConfig) -> Result<()> {
    let (hub, dispatcher) = build_notifications(&config);
    if !hub.is_enabled() {
        tracing::warn!("No notification channel configured, report will only be logged");
    }

    let mut bot = build_loop(&config, hub.clone()).await?;
    let report = bot.report_now(Utc::now()).await;
    println!("{}", report.subject());

    drop(bot);
    flush_notifications(hub, dispatcher).await;
    Ok(())
}

async fn status(config: BotConfig) -> Result<()> {
    let store = StateStore::new(&config.storage.state_path);
    let Some(state) = store
        .load()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to read portfolio state")?
    else {
        println!("No saved state at {}", store.path().display());
        return Ok(());
    };

    println!("Portfolio ({})", config.trading.symbol);
    println!("  Equity:       ${:.2}", state.equity);
    println!("  Cash:         ${:.2}", state.budget.available_capital);
    match &state.position {
        Some(p) => println!(
            "  Position:     {:.6} {} @ ${:.2} avg (cost ${:.2})",
            p.quantity, p.asset, p.average_entry_price, p.total_cost
        ),
        None => println!("  Position:     none"),
    }
    println!(
        "  DCA:          {}/{} intervals done",
        state.schedule.completed_intervals, state.schedule.planned_intervals
    );
    if let Some(last_bar) = state.last_bar_at {
        println!("  Last bar:     {}", last_bar);
    }
    if let Some(last_report) = state.last_report_at {
        println!("  Last report:  {}", last_report);
    }
    println!("  Updated:      {}", state.updated_at);

    Ok(())
}

async fn build_loop(config: &BotConfig, hub: NotificationHub) -> Result<TradingLoop> {
    let source: Arc<dyn MarketDataSource> = match config.exchange.source {
        MarketSource::Bybit => Arc::new(
            BybitClient::new(&config.exchange).context("Failed to build Bybit client")?,
        ),
        MarketSource::Csv => Arc::new(CsvBarSource::new(&config.exchange.csv_path)),
    };

    let store = StateStore::new(&config.storage.state_path);
    let fresh = PortfolioState::new(
        config.trading.initial_capital,
        config.trading.max_per_trade,
        config.trading.planned_intervals,
    );
    let mut state = store
        .load_or(fresh)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load portfolio state")?;

    // Budget limits follow the config; balances come from the saved state
    state.budget.max_per_trade = config.trading.max_per_trade;
    state.schedule.planned_intervals = config.trading.planned_intervals;

    tracing::info!(
        cash = state.budget.available_capital,
        holdings = state.holdings(),
        completed = state.schedule.completed_intervals,
        "Portfolio state loaded"
    );

    let mut bot = TradingLoop::from_config(
        config,
        source,
        Box::new(PaperExchange::new(config.trading.commission_rate)),
        state,
    )
    .with_store(store)
    .with_trade_log(TradeLog::new(&config.storage.trade_log_path))
    .with_notifications(hub);

    if config.strategy.use_sentiment {
        let sentiment: Arc<dyn SentimentSource> = Arc::new(
            FearGreedClient::new(&config.exchange.sentiment_url, config.exchange.request_timeout_secs)
                .context("Failed to build Fear & Greed client")?,
        );
        bot = bot.with_sentiment(sentiment);
    }

    Ok(bot)
}

fn build_notifications(config: &BotConfig) -> (NotificationHub, Option<JoinHandle<()>>) {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(telegram) = &config.notify.telegram {
        match TelegramNotifier::new(telegram) {
            Ok(n) => notifiers.push(Box::new(n)),
            Err(e) => tracing::warn!("Telegram disabled: {}", e),
        }
    }
    if let Some(email) = &config.notify.email {
        match EmailNotifier::new(email) {
            Ok(n) => notifiers.push(Box::new(n)),
            Err(e) => tracing::warn!("Email disabled: {}", e),
        }
    }

    if notifiers.is_empty() {
        tracing::info!("No notification channels configured");
        return (NotificationHub::disabled(), None);
    }

    let (hub, handle) = NotificationHub::spawn(notifiers, config.notify.queue_capacity);
    (hub, Some(handle))
}

/// Drop the last sender and give queued messages a bounded time to go out
async fn flush_notifications(hub: NotificationHub, dispatcher: Option<JoinHandle<()>>) {
    drop(hub);
    if let Some(handle) = dispatcher {
        if tokio::time::timeout(Duration::from_secs(NOTIFY_FLUSH_TIMEOUT_SECS), handle)
            .await
            .is_err()
        {
            tracing::warn!("Timed out flushing notifications");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Received Ctrl-C");
}
