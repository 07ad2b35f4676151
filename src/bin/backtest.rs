use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use fixture_forecast::backtest::{BacktestOptions, Metrics, run_backtest};
use fixture_forecast::config::{self, AppConfig};
use fixture_forecast::dataset::{self, DateOrder};
use fixture_forecast::logging::{self, LogFormat};

/// Walk-forward evaluation of the outcome estimator on a match history.
#[derive(Parser, Debug)]
#[command(name = "backtest", version, about, long_about = None)]
struct Args {
    #[arg(long)]
    data: Option<PathBuf>,

    #[arg(long)]
    date_order: Option<DateOrder>,

    /// Seasons to predict, comma separated. Defaults to the latest one.
    #[arg(long)]
    season: Option<String>,

    /// Earlier seasons included in each prediction's history
    #[arg(long, default_value_t = 1)]
    history_seasons: usize,

    /// Minimum earlier matches per team before a match is scored
    #[arg(long, default_value_t = 5)]
    min_history: usize,

    /// Blend in the shots/corners goal regression
    #[arg(long)]
    model: bool,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    config::load_dotenv();
    let args = Args::parse();
    logging::init("info", LogFormat::from_env());

    let app = AppConfig::from_env(args.config.as_deref())?;
    let order = args.date_order.unwrap_or(app.date_order);
    let data = args
        .data
        .or(app.data_path)
        .ok_or_else(|| anyhow!("no match data: pass --data or set FORECAST_DATA"))?;

    let (table, _) = dataset::load_csv(&data, order)?;
    let targets = table.select_seasons(args.season.as_deref())?;

    let opts = BacktestOptions {
        target_seasons: targets,
        history_seasons: args.history_seasons.min(10),
        min_history: args.min_history,
        use_model: args.model,
    };
    let report = run_backtest(&table, &app.estimator, &opts);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Seasons: {}", opts.target_seasons);
    println!("Evaluated: {}  Skipped: {}", report.evaluated, report.skipped);
    print_metrics("Model", &report.model);
    print_metrics("Base rates", &report.baseline);
    if report.evaluated > 0 {
        println!("Home-win calibration:");
        for bin in report.home_calibration.iter().filter(|b| b.count > 0) {
            println!(
                "  {:>3.0}-{:<3.0}%  n={:<4}  predicted {:>5.1}%  actual {:>5.1}%",
                bin.bucket_start * 100.0,
                bin.bucket_end * 100.0,
                bin.count,
                bin.avg_pred * 100.0,
                bin.actual_rate * 100.0
            );
        }
    }
    Ok(())
}

fn print_metrics(label: &str, m: &Metrics) {
    println!(
        "{label:<11} brier {:.4}  logloss {:.4}  accuracy {:.1}%",
        m.brier,
        m.log_loss,
        m.accuracy * 100.0
    );
}
