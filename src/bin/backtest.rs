use clap::Parser;
use dcabot::api::CsvBarSource;
use dcabot::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use dcabot::config::BotConfig;
use dcabot::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backtest", about = "Replay history through the trading loop with paper fills")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay bars from a CSV file
    #[arg(long, conflicts_with = "scenario")]
    csv: Option<PathBuf>,

    /// Synthetic scenario: uptrend, downtrend, sideways, volatile, crash
    #[arg(long)]
    scenario: Option<MarketScenario>,

    /// Number of synthetic daily bars
    #[arg(long, default_value_t = 365)]
    bars: usize,

    /// Seed for synthetic data
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dcabot=warn")),
        )
        .init();

    let config = BotConfig::load(args.config.as_deref())?;
    let runner = BacktestRunner::new(config.clone());

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║               DCABOT BACKTEST                         ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!(
        "   Capital ${:.2} | max ${:.2}/buy | {} intervals | stop {}x ATR({})",
        config.trading.initial_capital,
        config.trading.max_per_trade,
        config.trading.planned_intervals,
        config.strategy.atr_multiplier,
        config.strategy.atr_period
    );

    if let Some(path) = &args.csv {
        let bars = CsvBarSource::new(path).load_all()?;
        println!("\n🔬 Replaying {} ({} bars)", path.display(), bars.len());
        runner.run(bars).await?.print_report();
        return Ok(());
    }

    let scenarios: Vec<MarketScenario> = match args.scenario {
        Some(scenario) => vec![scenario],
        None => MarketScenario::ALL.to_vec(),
    };

    let mut results = Vec::new();
    for scenario in scenarios {
        let bars = SyntheticDataGenerator::new(args.seed).generate(scenario, args.bars);
        println!("\n🔬 Scenario: {} ({} bars, seed {})", scenario.name(), bars.len(), args.seed);

        match runner.run(bars).await {
            Ok(metrics) => {
                metrics.print_report();
                results.push((scenario, metrics));
            }
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", scenario.name(), e),
        }
    }

    if results.len() > 1 {
        print_summary(&results);
    }

    Ok(())
}

fn print_summary(results: &[(MarketScenario, BacktestMetrics)]) {
    println!("\n{:<12} {:>6} {:>6} {:>12} {:>10} {:>10}", "Scenario", "Buys", "Stops", "Final", "Return", "Max DD");
    println!("{}", "-".repeat(62));
    for (scenario, m) in results {
        println!(
            "{:<12} {:>6} {:>6} {:>12.2} {:>9.2}% {:>9.2}%",
            scenario.name(),
            m.buys,
            m.stop_loss_exits,
            m.final_equity,
            m.total_return_pct,
            m.max_drawdown_pct
        );
    }
}
