//! Integration tests for the runner: config file → discovered datasets →
//! parallel batch → artifacts on disk.
//!
//! Bar files are generated with the seeded synthetic provider so every run is
//! offline and reproducible.

use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use fxlab_core::data::{write_bars_csv, DataError, DataProvider, FetchRequest, SyntheticProvider};
use fxlab_core::domain::{Pair, Timeframe};
use fxlab_runner::config::BacktestConfig;
use fxlab_runner::data_loader::LoadError;
use fxlab_runner::reporting::{import_summary_json, load_artifacts, write_artifacts, write_batch_index, IndexEntry};
use fxlab_runner::runner::{run_batch, RunError};

fn write_synthetic(data_dir: &Path, pair: &str, seed: u64) -> PathBuf {
    let request = FetchRequest {
        pair: Pair::new(pair).unwrap(),
        timeframe: Timeframe::M15,
        start: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
    };
    let fetched = SyntheticProvider::new(seed).fetch(&request).unwrap();
    let path = data_dir.join(request.file_name());
    write_bars_csv(File::create(&path).unwrap(), &fetched.bars).unwrap();
    path
}

/// Workspace with `data/` holding EURUSD and USDJPY bars and a config file.
fn workspace(extra_toml: &str) -> (tempfile::TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    write_synthetic(&data_dir, "EURUSD", 11);
    write_synthetic(&data_dir, "USDJPY", 11);

    let config = format!(
        r#"
pairs = ["EURUSD", "USDJPY"]
timeframe = "M15"
data_dir = "data"
risk_per_candle_pct = 0.5
emergency_sl_pct_of_equity = 2.0
take_profit_mode = "fixed_pips"
take_profit_value = 15.0
trading_hours = {{ start = 7, end = 19 }}
news_filter_enabled = true
news_recurring_years = [2025]
pre_news_window = 30
post_news_window = 30
spread_pips = 1.0
{extra_toml}
"#
    );
    let config_path = root.path().join("fxlab.toml");
    std::fs::write(&config_path, config).unwrap();
    (root, config_path)
}

#[test]
fn batch_runs_every_pair_and_writes_artifacts() {
    let (root, config_path) = workspace("");
    let config = BacktestConfig::load(&config_path).unwrap();
    let reports = run_batch(&config).unwrap();

    let labels: Vec<_> = reports.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        ["EURUSD_M15_2025-09-01_2025-09-30", "USDJPY_M15_2025-09-01_2025-09-30"]
    );

    let out = root.path().join("out");
    for report in &reports {
        assert!(report.result.bars > 2_000);
        assert_eq!(report.result.trades.len(), report.summary.performance.trade_count);
        assert_eq!(report.fingerprint.pair, report.result.pair);

        let paths = write_artifacts(report, &out).unwrap();
        assert!(paths.summary.exists());
        assert!(paths.trades_json.exists());
        assert!(paths.equity_csv.exists());
        let trades_csv = std::fs::read_to_string(&paths.trades_csv).unwrap();
        assert_eq!(trades_csv.lines().count(), report.result.trades.len() + 1);

        let loaded = load_artifacts(&paths.dir).unwrap();
        assert_eq!(loaded.label, report.label);
        assert_eq!(loaded.fingerprint, report.fingerprint);
        assert_eq!(loaded.result.trades.len(), report.result.trades.len());
        let pnl = report.summary.performance.total_pnl;
        assert!((loaded.summary.performance.total_pnl - pnl).abs() < 1e-6);
    }

    let index_path = write_batch_index(&reports, &out).unwrap();
    let index: Vec<IndexEntry> = serde_json::from_str(&std::fs::read_to_string(index_path).unwrap()).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index[1].pair, "USDJPY");
}

#[test]
fn repeated_batches_are_identical() {
    let (_root, config_path) = workspace("");
    let config = BacktestConfig::load(&config_path).unwrap();
    let a = run_batch(&config).unwrap();
    let b = run_batch(&config).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.fingerprint, y.fingerprint);
        assert_eq!(x.result.trades, y.result.trades);
        assert_eq!(x.summary, y.summary);
    }
}

#[test]
fn newer_schema_is_rejected() {
    let (root, config_path) = workspace("");
    let config = BacktestConfig::load(&config_path).unwrap();
    let reports = run_batch(&config).unwrap();
    let paths = write_artifacts(&reports[0], &root.path().join("out")).unwrap();

    let json = std::fs::read_to_string(&paths.summary).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["schema_version"] = serde_json::json!(99);
    let err = import_summary_json(&value.to_string()).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version 99"));
}

#[test]
fn pair_without_data_fails_discovery() {
    let (_root, config_path) = workspace("");
    let mut config = BacktestConfig::load(&config_path).unwrap();
    config.pairs.push("GBPUSD".into());
    let err = run_batch(&config).unwrap_err();
    assert!(matches!(
        err,
        RunError::Load(LoadError::NoDatasets { ref pair, .. }) if pair == "GBPUSD"
    ));
}

#[test]
fn gap_in_a_dataset_names_the_dataset() {
    let (root, config_path) = workspace("");
    let path = root.path().join("data").join("EURUSD_M15_gappy.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "time,open,high,low,close").unwrap();
    writeln!(f, "2025-09-02 10:00:00,1.1000,1.1010,1.0990,1.1005").unwrap();
    writeln!(f, "2025-09-02 10:15:00,1.1005,1.1015,1.0995,1.1010").unwrap();
    writeln!(f, "2025-09-02 11:30:00,1.1010,1.1020,1.1000,1.1015").unwrap();
    drop(f);

    let config = BacktestConfig::load(&config_path).unwrap();
    let err = run_batch(&config).unwrap_err();
    match err {
        RunError::Data { label, source } => {
            assert_eq!(label, "EURUSD_M15_gappy");
            assert!(matches!(source, DataError::DataGap { index: 2, .. }));
        }
        other => panic!("expected a data error, got {other}"),
    }
}

#[test]
fn out_of_range_risk_is_a_config_error() {
    let (_root, config_path) = workspace("");
    let mut config = BacktestConfig::load(&config_path).unwrap();
    config.risk_per_candle_pct = -1.0;
    assert!(matches!(run_batch(&config), Err(RunError::Config(_))));
}

#[test]
fn unknown_key_fails_to_load() {
    let (_root, config_path) = workspace("risk_per_trade = 1.0");
    assert!(BacktestConfig::load(&config_path).is_err());
}

#[test]
fn malformed_news_file_aborts_the_batch() {
    let (root, config_path) = workspace(r#"news_file = "news.csv""#);
    std::fs::write(root.path().join("news.csv"), "timestamp,impact,name\nyesterday,high,NFP\n").unwrap();
    let config = BacktestConfig::load(&config_path).unwrap();
    assert!(matches!(run_batch(&config), Err(RunError::News(_))));
}
