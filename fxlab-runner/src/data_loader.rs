//! Dataset discovery, bar loading and news calendar assembly.
//!
//! Datasets come from the config's explicit `datasets` list or, when that is
//! empty, from `data_dir` files named `{PAIR}_{TIMEFRAME}*.csv` (the layout
//! `fxlab fetch` writes). Every loaded series is validated before it reaches
//! the engine.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use fxlab_core::data::{read_bars_csv, validate_series, DataError};
use fxlab_core::domain::{Bar, Pair, Timeframe};
use fxlab_core::news::{load_news_file, recurring_events, NewsCalendar, NewsDataParseError};

use crate::config::{BacktestConfig, ConfigError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no {timeframe} bar files for {pair} in {}", dir.display())]
    NoDatasets {
        pair: String,
        timeframe: Timeframe,
        dir: PathBuf,
    },

    #[error("cannot read data directory {}: {source}", dir.display())]
    DataDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One bar file to backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Unique name within a batch; used for output directories.
    pub label: String,
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub path: PathBuf,
}

/// Resolve the datasets for a batch, sorted by label.
pub fn discover_datasets(config: &BacktestConfig) -> Result<Vec<Dataset>, LoadError> {
    let mut datasets = if config.datasets.is_empty() {
        scan_data_dir(config)?
    } else {
        let mut explicit = Vec::with_capacity(config.datasets.len());
        for ds in &config.datasets {
            let pair = Pair::new(&ds.pair).map_err(|e| ConfigError::invalid("datasets", e.to_string()))?;
            let label = ds.label.clone().unwrap_or_else(|| file_stem(&ds.path));
            explicit.push(Dataset {
                label,
                pair,
                timeframe: config.timeframe,
                path: ds.path.clone(),
            });
        }
        explicit
    };

    datasets.sort_by(|a, b| a.label.cmp(&b.label));
    for label in dedup_labels(&mut datasets) {
        warn!(%label, "duplicate dataset label, suffixed");
    }
    Ok(datasets)
}

fn scan_data_dir(config: &BacktestConfig) -> Result<Vec<Dataset>, LoadError> {
    let dir = &config.data_dir;
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::DataDir {
        dir: dir.clone(),
        source,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::DataDir {
            dir: dir.clone(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }

    let mut datasets = Vec::new();
    for pair in config.pairs()? {
        let prefix = format!("{}_{}", pair.symbol(), config.timeframe.as_str());
        let before = datasets.len();
        for path in &files {
            let stem = file_stem(path);
            let matches = stem
                .to_ascii_uppercase()
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'));
            if matches {
                datasets.push(Dataset {
                    label: stem,
                    pair: pair.clone(),
                    timeframe: config.timeframe,
                    path: path.clone(),
                });
            }
        }
        if datasets.len() == before {
            return Err(LoadError::NoDatasets {
                pair: pair.to_string(),
                timeframe: config.timeframe,
                dir: dir.clone(),
            });
        }
    }
    Ok(datasets)
}

/// Make labels unique by suffixing repeats. Returns the labels that repeated.
fn dedup_labels(datasets: &mut [Dataset]) -> Vec<String> {
    let mut repeated = Vec::new();
    let mut seen = std::collections::BTreeMap::<String, usize>::new();
    for ds in datasets.iter_mut() {
        let count = seen.entry(ds.label.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            repeated.push(ds.label.clone());
            ds.label = format!("{}_{}", ds.label, count);
        }
    }
    repeated
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Read a dataset's bars and check ordering, alignment and gaps.
pub fn load_dataset(dataset: &Dataset, max_missing_bars: usize) -> Result<Vec<Bar>, DataError> {
    let bars = read_bars_csv(&dataset.path)?;
    validate_series(&bars, dataset.timeframe, max_missing_bars)?;
    debug!(label = %dataset.label, bars = bars.len(), "dataset loaded");
    Ok(bars)
}

/// Build the news calendar shared by every run in a batch.
///
/// A missing news file leaves the calendar with only the recurring events; a
/// malformed one is an error.
pub fn load_calendar(config: &BacktestConfig) -> Result<NewsCalendar, NewsDataParseError> {
    let strategy = config.to_strategy_config();
    if !strategy.news.enabled {
        return Ok(NewsCalendar::disabled());
    }

    let mut events = recurring_events(&config.news_recurring_years);
    if let Some(path) = &config.news_file {
        match load_news_file(path)? {
            Some(file_events) => events.extend(file_events),
            None => warn!(path = %path.display(), "news filter running without the news file"),
        }
    }
    if events.is_empty() {
        warn!("news filter enabled but no events loaded; nothing will be blocked");
    }

    let calendar = NewsCalendar::new(events, &strategy.news);
    debug!(
        events = calendar.events().len(),
        high_impact = calendar.high_impact_count(),
        "news calendar built"
    );
    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;

    fn config_for(dir: &Path, pairs: &[&str]) -> BacktestConfig {
        BacktestConfig {
            pairs: pairs.iter().map(|p| p.to_string()).collect(),
            data_dir: dir.to_path_buf(),
            ..BacktestConfig::default()
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "time,open,high,low,close\n").unwrap();
    }

    #[test]
    fn discovers_pair_timeframe_files_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "EURUSD_M15_2025-09-01_2025-09-30.csv");
        touch(dir.path(), "EURUSD_M15_2025-10-01_2025-10-31.csv");
        touch(dir.path(), "EURUSD_M1_2025-09-01_2025-09-30.csv");
        touch(dir.path(), "EURUSD_M15.txt");
        touch(dir.path(), "GBPUSD_M15.csv");

        let found = discover_datasets(&config_for(dir.path(), &["EURUSD"])).unwrap();
        let labels: Vec<_> = found.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(
            labels,
            ["EURUSD_M15_2025-09-01_2025-09-30", "EURUSD_M15_2025-10-01_2025-10-31"]
        );
        assert!(found.iter().all(|d| d.pair.symbol() == "EURUSD"));
    }

    #[test]
    fn pair_without_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "EURUSD_M15.csv");
        let err = discover_datasets(&config_for(dir.path(), &["EURUSD", "USDJPY"])).unwrap_err();
        assert!(matches!(err, LoadError::NoDatasets { ref pair, .. } if pair == "USDJPY"));
    }

    #[test]
    fn explicit_datasets_keep_labels_unique() {
        let mut cfg = config_for(Path::new("."), &["EURUSD"]);
        cfg.datasets = vec![
            DatasetConfig { pair: "EURUSD".into(), path: "a/EURUSD.csv".into(), label: None },
            DatasetConfig { pair: "EURUSD".into(), path: "b/EURUSD.csv".into(), label: None },
        ];
        let found = discover_datasets(&cfg).unwrap();
        assert_eq!(found[0].label, "EURUSD");
        assert_eq!(found[1].label, "EURUSD_2");
    }

    #[test]
    fn missing_news_file_degrades_to_recurring_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_for(dir.path(), &["EURUSD"]);
        cfg.news_file = Some(dir.path().join("missing.csv"));
        cfg.news_recurring_years = vec![2025];
        let calendar = load_calendar(&cfg).unwrap();
        assert!(calendar.is_enabled());
        assert!(calendar.high_impact_count() > 0);

        cfg.news_filter_enabled = false;
        assert!(!load_calendar(&cfg).unwrap().is_enabled());
    }

    #[test]
    fn malformed_news_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.csv");
        std::fs::write(&path, "timestamp,impact,name\nnot-a-date,high,CPI\n").unwrap();
        let mut cfg = config_for(dir.path(), &["EURUSD"]);
        cfg.news_file = Some(path);
        assert!(load_calendar(&cfg).is_err());
    }
}
