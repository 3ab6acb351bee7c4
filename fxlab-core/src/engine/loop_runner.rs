//! Whole-series driver around the simulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::aggregator::PerformanceMetrics;
use super::exit_policy::ExitPriority;
use super::simulator::{SimulationStats, Simulator};
use crate::config::{ConfigError, StrategyConfig};
use crate::data::{require_history, DataError};
use crate::domain::{Bar, EquityPoint, Pair, Timeframe, Trade};
use crate::news::NewsCalendar;
use crate::trend::TrendState;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub pair: String,
    pub timeframe: Timeframe,
    pub bars: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    pub stats: SimulationStats,
    pub final_trend: TrendState,
}

/// Run the strategy over a validated bar series.
///
/// Bars must already be ordered and gap-checked (see [`crate::data::validate_series`]).
/// It:
/// 1. Validates the config and resolves the pair's account conversion
/// 2. Checks there is enough history for the reference range
/// 3. Steps the simulator through every bar
/// 4. Closes anything still open at the last close
/// 5. Returns `RunResult` with trades, equity curve, metrics and counters
pub fn run_backtest(
    bars: &[Bar],
    pair: &Pair,
    timeframe: Timeframe,
    config: &StrategyConfig,
    calendar: Arc<NewsCalendar>,
) -> Result<RunResult, BacktestError> {
    run_backtest_with_priority(bars, pair, timeframe, config, calendar, ExitPriority::default())
}

/// [`run_backtest`] with an explicit intrabar exit priority.
pub fn run_backtest_with_priority(
    bars: &[Bar],
    pair: &Pair,
    timeframe: Timeframe,
    config: &StrategyConfig,
    calendar: Arc<NewsCalendar>,
    exit_priority: ExitPriority,
) -> Result<RunResult, BacktestError> {
    let mut sim = Simulator::new(config, pair.clone(), timeframe, calendar)?.with_exit_priority(exit_priority);
    require_history(bars, sim.required_history())?;

    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(DataError::InsufficientHistory {
            needed: sim.required_history(),
            available: 0,
        }
        .into());
    };

    let mut trades = Vec::new();
    for bar in bars {
        trades.extend(sim.step(bar));
    }
    trades.extend(sim.finish());

    debug!(
        pair = %pair,
        bars = bars.len(),
        trades = trades.len(),
        equity = sim.equity(),
        "backtest complete"
    );

    Ok(RunResult {
        pair: pair.to_string(),
        timeframe,
        bars: bars.len(),
        start: first.timestamp,
        end: last.timestamp,
        equity_curve: sim.aggregator().equity_curve().to_vec(),
        metrics: sim.aggregator().metrics(),
        stats: sim.stats(),
        final_trend: sim.trend_state(),
        trades,
    })
}
