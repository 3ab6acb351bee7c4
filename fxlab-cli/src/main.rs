//! FxLab CLI: backtest and data fetch commands.
//!
//! Commands:
//! - `run`: execute every dataset a TOML config names and write artifacts
//! - `fetch`: pull bars from the terminal bridge (or the synthetic generator)
//!   and store them as `{PAIR}_{TF}_{start}_{end}.csv`

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fxlab_core::data::{write_bars_csv, DataProvider, FetchRequest, SyntheticProvider, TerminalBridgeProvider};
use fxlab_core::domain::{Pair, Timeframe};
use fxlab_runner::reporting::{write_artifacts, write_batch_index};
use fxlab_runner::{run_batch, BacktestConfig, BacktestReport};

#[derive(Parser)]
#[command(name = "fxlab", about = "FxLab CLI: forex trend-following scale-in backtester")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest batch from a TOML config file.
    Run {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for per-run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Fetch bars for one pair and store them as CSV.
    Fetch {
        /// Pair symbol (e.g. EURUSD).
        #[arg(long)]
        pair: String,

        /// Timeframe: M1, M5, M15, M30, H1, H4 or D1.
        #[arg(long, default_value = "M15")]
        timeframe: String,

        /// First day (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: String,

        /// Last day (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: String,

        /// Base URL of the terminal bridge, e.g. http://127.0.0.1:8787.
        #[arg(long, conflicts_with = "synthetic")]
        bridge_url: Option<String>,

        /// Generate seeded synthetic bars instead of fetching.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Directory the CSV is written to.
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, output_dir } => run_cmd(config, output_dir),
        Commands::Fetch {
            pair,
            timeframe,
            start,
            end,
            bridge_url,
            synthetic,
            seed,
            output_dir,
        } => {
            let request = FetchRequest {
                pair: pair.parse::<Pair>()?,
                timeframe: timeframe.parse::<Timeframe>()?,
                start: parse_date(&start)?,
                end: parse_date(&end)?,
            };
            let provider: Box<dyn DataProvider> = match (bridge_url, synthetic) {
                (Some(url), _) => Box::new(TerminalBridgeProvider::new(&url)?),
                (None, true) => Box::new(SyntheticProvider::new(seed)),
                (None, false) => bail!("fetch needs --bridge-url or --synthetic"),
            };
            fetch_cmd(provider.as_ref(), &request, output_dir)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn run_cmd(config_path: PathBuf, output_dir: PathBuf) -> Result<()> {
    let config = BacktestConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let reports = run_batch(&config)?;

    for report in &reports {
        let paths = write_artifacts(report, &output_dir)?;
        info!(label = %report.label, dir = %paths.dir.display(), "artifacts written");
    }
    let index = write_batch_index(&reports, &output_dir)?;

    print_summary(&reports);
    println!("\nResults: {}", index.display());
    Ok(())
}

fn print_summary(reports: &[BacktestReport]) {
    println!(
        "{:<40} {:>7} {:>9} {:>8} {:>10} {:>9} {:>8}",
        "Dataset", "Trades", "Return", "Win %", "Expect.", "Max DD", "PF"
    );
    for r in reports {
        let m = &r.summary.performance;
        let pf = m
            .profit_factor
            .map(|pf| format!("{pf:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:>7} {:>8.2}% {:>7.1}% {:>10.2} {:>8.2}% {:>8}",
            r.label,
            m.trade_count,
            m.total_return * 100.0,
            m.win_rate * 100.0,
            m.expectancy,
            m.max_drawdown_pct * 100.0,
            pf
        );
    }
}

fn fetch_cmd(provider: &dyn DataProvider, request: &FetchRequest, output_dir: PathBuf) -> Result<()> {
    if request.end < request.start {
        bail!("--end {} is before --start {}", request.end, request.start);
    }
    let fetched = provider.fetch(request)?;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(request.file_name());
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    write_bars_csv(file, &fetched.bars)?;

    info!(
        provider = provider.name(),
        source = ?fetched.source,
        bars = fetched.bars.len(),
        path = %path.display(),
        "bars written"
    );
    println!("{} bars → {}", fetched.bars.len(), path.display());
    Ok(())
}
