//! FxLab Runner: backtest orchestration on top of `fxlab-core`.
//!
//! This crate provides:
//! - TOML configuration with validation and path resolution
//! - Dataset discovery and news calendar assembly
//! - Parallel batch runs with per-run fingerprints
//! - Post-run metrics (monthly breakdown, streaks, R-multiples)
//! - JSON and CSV artifacts

pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod reporting;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, DatasetConfig, HoursConfig};
pub use data_loader::{discover_datasets, load_calendar, load_dataset, Dataset, LoadError};
pub use metrics::{MonthlyStats, RunSummary};
pub use reporting::{load_artifacts, write_artifacts, write_batch_index, ArtifactPaths, IndexEntry};
pub use runner::{run_bars, run_batch, run_dataset, BacktestReport, RunError, SCHEMA_VERSION};
