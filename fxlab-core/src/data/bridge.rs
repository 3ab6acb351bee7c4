//! Trading-terminal bridge provider.
//!
//! The terminal itself only exposes a local API, so history is pulled over a
//! small HTTP bridge running next to it. The bridge answers
//! `GET {base}/rates?symbol=EURUSD&timeframe=M15&from=<unix>&to=<unix>` with
//! the terminal's rate records as a JSON array.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult};
use crate::domain::Bar;

/// One rate record as the terminal reports it.
#[derive(Debug, Deserialize)]
struct RateRecord {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    #[allow(dead_code)]
    tick_volume: u64,
}

/// HTTP bridge to a running trading terminal.
pub struct TerminalBridgeProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl TerminalBridgeProvider {
    pub fn new(base_url: &str) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn rates_url(&self, request: &FetchRequest) -> String {
        let (from, to) = request.bounds();
        format!(
            "{}/rates?symbol={}&timeframe={}&from={}&to={}",
            self.base_url,
            request.pair,
            request.timeframe,
            from.timestamp(),
            to.timestamp()
        )
    }

    /// Convert rate records into bars, dropping any at or past the exclusive end.
    fn to_bars(request: &FetchRequest, records: Vec<RateRecord>) -> Result<Vec<Bar>, DataError> {
        let (_, to) = request.bounds();
        let mut bars = Vec::with_capacity(records.len());
        for (row, rec) in records.into_iter().enumerate() {
            let timestamp = chrono::DateTime::from_timestamp(rec.time, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {}", rec.time))
            })?;
            if timestamp >= to {
                continue;
            }
            let bar = Bar::new(timestamp, rec.open, rec.high, rec.low, rec.close);
            bar.validate()
                .map_err(|source| DataError::InvalidBar { row, source })?;
            bars.push(bar);
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn fetch_with_retry(&self, request: &FetchRequest) -> Result<Vec<RateRecord>, DataError> {
        let url = self.rates_url(request);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(attempt, ?delay, "retrying terminal bridge request");
                std::thread::sleep(delay);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::NoData {
                            pair: request.pair.to_string(),
                            timeframe: request.timeframe.to_string(),
                        });
                    }
                    if !status.is_success() {
                        last_error = Some(DataError::NetworkUnreachable(format!(
                            "HTTP {status} from terminal bridge"
                        )));
                        continue;
                    }
                    return resp.json::<Vec<RateRecord>>().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse rates for {}: {e}",
                            request.pair
                        ))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl DataProvider for TerminalBridgeProvider {
    fn name(&self) -> &str {
        "terminal_bridge"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        let records = self.fetch_with_retry(request)?;
        let bars = Self::to_bars(request, records)?;
        if bars.is_empty() {
            return Err(DataError::NoData {
                pair: request.pair.to_string(),
                timeframe: request.timeframe.to_string(),
            });
        }
        debug!(pair = %request.pair, bars = bars.len(), "fetched from terminal bridge");
        Ok(FetchResult {
            request: request.clone(),
            bars,
            source: DataSource::TerminalBridge,
        })
    }
}
