//! Backtesting engine: per-bar simulation and supporting pieces.
//!
//! Per bar: intrabar exits (emergency stop, take-profit), trend update,
//! reversal exits, optional flattening, then entry at the close.

pub mod aggregator;
pub mod cost_model;
pub mod exit_policy;
pub mod loop_runner;
pub mod simulator;

pub use aggregator::{PerformanceAggregator, PerformanceMetrics};
pub use cost_model::CostModel;
pub use exit_policy::{aggregate_loss, find_breach, ExitCheck, ExitPriority};
pub use loop_runner::{run_backtest, run_backtest_with_priority, BacktestError, RunResult};
pub use simulator::{SimulationStats, Simulator};
