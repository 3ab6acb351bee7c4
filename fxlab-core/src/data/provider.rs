//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over bar sources (terminal bridge,
//! synthetic generator) so the CLI can fetch without knowing which one it has,
//! and tests never need a live terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, BarError, Pair, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data gap at bar {index} ({timestamp}): {reason}")]
    DataGap {
        index: usize,
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("insufficient history: need at least {needed} bars, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("invalid bar at row {row}: {source}")]
    InvalidBar {
        row: usize,
        #[source]
        source: BarError,
    },

    #[error("malformed bar file at row {row}: {reason}")]
    Malformed { row: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no bars returned for {pair} {timeframe}")]
    NoData { pair: String, timeframe: String },
}

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub pair: Pair,
    pub timeframe: Timeframe,
    /// Inclusive first day (UTC).
    pub start: NaiveDate,
    /// Inclusive last day (UTC).
    pub end: NaiveDate,
}

impl FetchRequest {
    /// File name a fetched dataset is stored under: `EURUSD_M15_2025-09-01_2025-09-30.csv`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            self.pair,
            self.timeframe,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// `[start 00:00, end+1 00:00)` as UTC instants.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.start.and_time(chrono::NaiveTime::MIN).and_utc();
        let to = (self.end + chrono::Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        (from, to)
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    CsvImport,
    TerminalBridge,
    Synthetic,
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub request: FetchRequest,
    pub bars: Vec<Bar>,
    pub source: DataSource,
}

/// Trait for bar providers.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for a pair/timeframe over an inclusive day range, oldest first.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError>;
}
