//! Market data: CSV ingestion, series validation, and bar providers.

pub mod bridge;
pub mod ingest;
pub mod provider;
pub mod synthetic;

pub use bridge::TerminalBridgeProvider;
pub use ingest::{parse_bars, parse_timestamp, read_bars_csv, require_history, validate_series, write_bars_csv};
pub use provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult};
pub use synthetic::SyntheticProvider;
