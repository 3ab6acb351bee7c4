//! Backtest runner: wires together config, datasets, engine, and metrics.
//!
//! Entry points:
//! - `run_bars()`: pre-loaded bars, no I/O. Used by tests and the fetch preview.
//! - `run_dataset()`: loads and validates one dataset, then runs it.
//! - `run_batch()`: every discovered dataset, in parallel with rayon.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use fxlab_core::config::StrategyConfig;
use fxlab_core::data::DataError;
use fxlab_core::domain::{Bar, Pair, Timeframe};
use fxlab_core::engine::{run_backtest_with_priority, BacktestError, ExitPriority, RunResult};
use fxlab_core::fingerprint::RunFingerprint;
use fxlab_core::news::{NewsCalendar, NewsDataParseError};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{discover_datasets, load_calendar, load_dataset, Dataset, LoadError};
use crate::metrics::RunSummary;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("news data error: {0}")]
    News(#[from] NewsDataParseError),

    #[error("dataset discovery failed: {0}")]
    Load(#[from] LoadError),

    #[error("dataset '{label}': {source}")]
    Data {
        label: String,
        #[source]
        source: DataError,
    },
}

impl RunError {
    fn in_dataset(label: &str, err: BacktestError) -> Self {
        match err {
            BacktestError::Config(e) => RunError::Config(e),
            BacktestError::Data(source) => RunError::Data {
                label: label.to_string(),
                source,
            },
        }
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one dataset's backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub label: String,
    pub fingerprint: RunFingerprint,
    pub exit_priority: ExitPriority,
    pub config: StrategyConfig,
    pub summary: RunSummary,
    pub result: RunResult,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run pre-loaded, validated bars: no I/O.
pub fn run_bars(
    label: &str,
    bars: &[Bar],
    pair: &Pair,
    timeframe: Timeframe,
    config: &StrategyConfig,
    exit_priority: ExitPriority,
    calendar: Arc<NewsCalendar>,
) -> Result<BacktestReport, RunError> {
    let fingerprint = RunFingerprint::new(config, pair.symbol(), timeframe, bars);
    let result = run_backtest_with_priority(bars, pair, timeframe, config, calendar, exit_priority)
        .map_err(|e| RunError::in_dataset(label, e))?;
    let summary = RunSummary::compute(&result);

    info!(
        label,
        run_id = %fingerprint.run_id,
        trades = result.trades.len(),
        total_return = result.metrics.total_return,
        max_drawdown_pct = result.metrics.max_drawdown_pct,
        "run complete"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        label: label.to_string(),
        fingerprint,
        exit_priority,
        config: config.clone(),
        summary,
        result,
    })
}

/// Load one dataset and run it.
pub fn run_dataset(
    config: &BacktestConfig,
    strategy: &StrategyConfig,
    dataset: &Dataset,
    calendar: Arc<NewsCalendar>,
) -> Result<BacktestReport, RunError> {
    let bars = load_dataset(dataset, config.max_missing_bars).map_err(|source| RunError::Data {
        label: dataset.label.clone(),
        source,
    })?;
    run_bars(
        &dataset.label,
        &bars,
        &dataset.pair,
        dataset.timeframe,
        strategy,
        config.exit_priority,
        calendar,
    )
}

/// Validate the config, discover datasets and run them all in parallel.
///
/// Reports come back sorted by label. The first fatal error aborts the batch.
pub fn run_batch(config: &BacktestConfig) -> Result<Vec<BacktestReport>, RunError> {
    config.validate()?;
    let strategy = config.to_strategy_config();
    let datasets = discover_datasets(config)?;
    let calendar = Arc::new(load_calendar(config)?);

    info!(
        datasets = datasets.len(),
        pairs = config.pairs.len(),
        timeframe = %config.timeframe,
        news_events = calendar.events().len(),
        "starting batch"
    );

    let mut reports = datasets
        .par_iter()
        .map(|ds| run_dataset(config, &strategy, ds, Arc::clone(&calendar)))
        .collect::<Result<Vec<_>, _>>()?;
    reports.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(reports)
}
