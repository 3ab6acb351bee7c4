//! Run fingerprinting: deterministic identification of a backtest run.
//!
//! - `DatasetHash`: blake3 over the exact bar series.
//! - `ConfigHash`: blake3 over the canonical JSON of the strategy config.
//! - `RunFingerprint`: both hashes plus the run's identity, combined into a run id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StrategyConfig;
use crate::domain::{Bar, Timeframe};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of the bar series: timestamp and OHLC bit patterns, in order.
pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        for price in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&price.to_bits().to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Hash of every strategy parameter. Field order is fixed by the struct and
/// conversion rates live in a `BTreeMap`, so the JSON is canonical.
pub fn config_hash(config: &StrategyConfig) -> ConfigHash {
    // plain structs and maps of f64 always serialize
    let json = serde_json::to_vec(config).unwrap_or_default();
    ConfigHash(blake3::hash(&json).to_hex().to_string())
}

/// Complete identity of one backtest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_id: String,
    pub pair: String,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bars: usize,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunFingerprint {
    pub fn new(config: &StrategyConfig, pair: &str, timeframe: Timeframe, bars: &[Bar]) -> Self {
        let config_hash = config_hash(config);
        let dataset_hash = dataset_hash(bars);

        let mut hasher = blake3::Hasher::new();
        hasher.update(config_hash.0.as_bytes());
        hasher.update(dataset_hash.0.as_bytes());
        hasher.update(pair.as_bytes());
        hasher.update(timeframe.as_str().as_bytes());
        let run_id = hasher.finalize().to_hex()[..16].to_string();

        let start = bars.first().map(|b| b.timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = bars.last().map(|b| b.timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Self {
            run_id,
            pair: pair.to_string(),
            timeframe,
            start,
            end,
            bars: bars.len(),
            config_hash,
            dataset_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(n: usize) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let p = 1.1 + i as f64 * 0.0001;
                Bar::new(t0 + Duration::minutes(15 * i as i64), p, p + 0.0002, p - 0.0002, p + 0.0001)
            })
            .collect()
    }

    #[test]
    fn dataset_hash_sees_every_price() {
        let a = bars(10);
        let mut b = a.clone();
        b[7].close += 0.00001;
        assert_eq!(dataset_hash(&a), dataset_hash(&bars(10)));
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }

    #[test]
    fn config_hash_tracks_parameters() {
        let c1 = StrategyConfig::default();
        let mut c2 = StrategyConfig::default();
        c2.risk.risk_per_candle_pct = 0.02;
        assert_eq!(config_hash(&c1), config_hash(&StrategyConfig::default()));
        assert_ne!(config_hash(&c1), config_hash(&c2));
    }

    #[test]
    fn run_id_is_stable_and_pair_specific() {
        let cfg = StrategyConfig::default();
        let data = bars(5);
        let f1 = RunFingerprint::new(&cfg, "EURUSD", Timeframe::M15, &data);
        let f2 = RunFingerprint::new(&cfg, "EURUSD", Timeframe::M15, &data);
        let f3 = RunFingerprint::new(&cfg, "GBPUSD", Timeframe::M15, &data);
        assert_eq!(f1, f2);
        assert_ne!(f1.run_id, f3.run_id);
        assert_eq!(f1.run_id.len(), 16);
        assert_eq!(f1.bars, 5);
    }
}
