//! Run artifacts: trade log (CSV + JSON), equity curve and summary JSON.
//!
//! Each report lands in `{output_dir}/{label}/`:
//! - `summary.json`: the full [`BacktestReport`] with schema version
//! - `trades.json`: the trade log alone
//! - `trades.csv`: one row per closed position
//! - `equity.csv`: realized equity curve
//!
//! A batch also writes `{output_dir}/index.json` with one line per run.
//! Summaries with a newer schema version than this build are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use fxlab_core::domain::{EquityPoint, Trade};

use crate::runner::{BacktestReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON.
pub fn export_summary_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_summary_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

pub fn export_trades_json(trades: &[Trade]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("failed to serialize trade log to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade log as CSV.
///
/// Columns: position_id, pair, direction, exit_reason, entry_bar, entry_time,
/// entry_price, take_profit, exit_bar, exit_time, exit_price, lots,
/// risk_amount, pnl, costs, r_multiple
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "position_id",
        "pair",
        "direction",
        "exit_reason",
        "entry_bar",
        "entry_time",
        "entry_price",
        "take_profit",
        "exit_bar",
        "exit_time",
        "exit_price",
        "lots",
        "risk_amount",
        "pnl",
        "costs",
        "r_multiple",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.position_id.to_string(),
            &t.pair,
            &format!("{:?}", t.direction),
            t.status.as_str(),
            &t.entry_bar.to_string(),
            &t.entry_timestamp.to_rfc3339(),
            &format!("{:.5}", t.entry_price),
            &format!("{:.5}", t.take_profit_price),
            &t.exit_bar.to_string(),
            &t.exit_timestamp.to_rfc3339(),
            &format!("{:.5}", t.exit_price),
            &format!("{:.2}", t.size),
            &format!("{:.2}", t.risk_amount),
            &format!("{:.2}", t.realized_pnl),
            &format!("{:.2}", t.costs_paid),
            &format!("{:.3}", t.r_multiple()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the realized equity curve.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "equity", "drawdown", "drawdown_pct"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.timestamp.to_rfc3339(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.drawdown_from_peak),
            &format!("{:.6}", p.drawdown_pct()),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Files written for one report.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub summary: PathBuf,
    pub trades_csv: PathBuf,
    pub trades_json: PathBuf,
    pub equity_csv: PathBuf,
}

/// Write the artifact set for one report under `output_dir/{label}/`.
pub fn write_artifacts(report: &BacktestReport, output_dir: &Path) -> Result<ArtifactPaths> {
    let dir = output_dir.join(&report.label);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let paths = ArtifactPaths {
        summary: dir.join("summary.json"),
        trades_csv: dir.join("trades.csv"),
        trades_json: dir.join("trades.json"),
        equity_csv: dir.join("equity.csv"),
        dir,
    };

    write(&paths.summary, &export_summary_json(report)?)?;
    write(&paths.trades_csv, &export_trades_csv(&report.result.trades)?)?;
    write(&paths.trades_json, &export_trades_json(&report.result.trades)?)?;
    write(&paths.equity_csv, &export_equity_csv(&report.result.equity_curve)?)?;

    Ok(paths)
}

/// Load a report back from its artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_summary_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Batch index ────────────────────────────────────────────────────

/// One line of `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub label: String,
    pub pair: String,
    pub run_id: String,
    pub trades: usize,
    pub total_return: f64,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
    pub profit_factor: Option<f64>,
}

impl From<&BacktestReport> for IndexEntry {
    fn from(report: &BacktestReport) -> Self {
        let m = &report.summary.performance;
        Self {
            label: report.label.clone(),
            pair: report.result.pair.clone(),
            run_id: report.fingerprint.run_id.clone(),
            trades: m.trade_count,
            total_return: m.total_return,
            win_rate: m.win_rate,
            max_drawdown_pct: m.max_drawdown_pct,
            profit_factor: m.profit_factor,
        }
    }
}

/// Write `index.json` listing every report of a batch.
pub fn write_batch_index(reports: &[BacktestReport], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let entries: Vec<IndexEntry> = reports.iter().map(IndexEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries).context("failed to serialize batch index")?;
    let path = output_dir.join("index.json");
    write(&path, &json)?;
    Ok(path)
}
