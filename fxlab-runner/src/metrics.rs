//! Run summary metrics: pure functions over the trade log.
//!
//! The engine's aggregator already tracks equity, drawdown and the headline
//! ratios. This module adds what is derived after the fact: the per-month
//! breakdown, streaks and R-multiples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fxlab_core::domain::Trade;
use fxlab_core::engine::{PerformanceMetrics, RunResult};

/// Trades closed in one calendar month (UTC, by exit time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    /// `YYYY-MM`.
    pub month: String,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub pnl: f64,
    /// P&L as a fraction of equity at the start of the month.
    pub return_pct: f64,
    pub equity_end: f64,
}

/// Headline metrics plus post-run statistics, as written to `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub performance: PerformanceMetrics,
    pub avg_r_multiple: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub exits: BTreeMap<String, usize>,
    pub monthly: Vec<MonthlyStats>,
}

impl RunSummary {
    pub fn compute(result: &RunResult) -> Self {
        Self {
            performance: result.metrics.clone(),
            avg_r_multiple: avg_r_multiple(&result.trades),
            avg_bars_held: avg_bars_held(&result.trades),
            max_consecutive_wins: max_consecutive_wins(&result.trades),
            max_consecutive_losses: max_consecutive_losses(&result.trades),
            exits: result.stats.exits.clone(),
            monthly: monthly_breakdown(&result.trades, result.metrics.initial_equity),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Group trades by exit month, in chronological order.
pub fn monthly_breakdown(trades: &[Trade], initial_equity: f64) -> Vec<MonthlyStats> {
    let mut by_month: BTreeMap<String, Vec<&Trade>> = BTreeMap::new();
    for t in trades {
        by_month
            .entry(t.exit_timestamp.format("%Y-%m").to_string())
            .or_default()
            .push(t);
    }

    let mut equity = initial_equity;
    by_month
        .into_iter()
        .map(|(month, month_trades)| {
            let pnl: f64 = month_trades.iter().map(|t| t.realized_pnl).sum();
            let wins = month_trades.iter().filter(|t| t.is_winner()).count();
            let start = equity;
            equity += pnl;
            MonthlyStats {
                month,
                trades: month_trades.len(),
                wins,
                win_rate: wins as f64 / month_trades.len() as f64,
                pnl,
                return_pct: if start > 0.0 { pnl / start } else { 0.0 },
                equity_end: equity,
            }
        })
        .collect()
}

pub fn avg_r_multiple(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.r_multiple()).sum::<f64>() / trades.len() as f64
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held() as f64).sum::<f64>() / trades.len() as f64
}

/// Longest run of winners in close order.
pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    longest_streak(trades, |t| t.realized_pnl > 0.0)
}

/// Longest run of losers (zero P&L breaks a streak) in close order.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    longest_streak(trades, |t| t.realized_pnl < 0.0)
}

fn longest_streak(trades: &[Trade], pred: impl Fn(&Trade) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for t in trades {
        if pred(t) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}
