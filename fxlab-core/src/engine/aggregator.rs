//! Performance aggregator: realized equity curve and running trade statistics.
//!
//! Equity moves only when a trade closes. Points are appended, never edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Trade};

/// Summary statistics over every recorded trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    /// Fractional return on initial equity.
    pub total_return: f64,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Mean realized P&L per trade.
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub max_drawdown: f64,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown_pct: f64,
    pub costs_paid: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceAggregator {
    initial_equity: f64,
    equity: f64,
    peak: f64,
    max_drawdown: f64,
    max_drawdown_pct: f64,
    points: Vec<EquityPoint>,
    trade_count: usize,
    wins: usize,
    losses: usize,
    gross_profit: f64,
    gross_loss: f64,
    costs_paid: f64,
}

impl PerformanceAggregator {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            equity: initial_equity,
            peak: initial_equity,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            points: Vec::new(),
            trade_count: 0,
            wins: 0,
            losses: 0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            costs_paid: 0.0,
        }
    }

    /// Anchor the curve with the opening equity. No-op once any point exists.
    pub fn begin(&mut self, timestamp: DateTime<Utc>) {
        if self.points.is_empty() {
            self.points.push(EquityPoint {
                timestamp,
                equity: self.initial_equity,
                drawdown_from_peak: 0.0,
            });
        }
    }

    /// Fold one closed trade into equity and statistics.
    pub fn record(&mut self, trade: &Trade) -> EquityPoint {
        self.begin(trade.entry_timestamp);

        self.equity += trade.realized_pnl;
        self.peak = self.peak.max(self.equity);
        let drawdown = self.peak - self.equity;
        self.max_drawdown = self.max_drawdown.max(drawdown);
        if self.peak > 0.0 {
            self.max_drawdown_pct = self.max_drawdown_pct.max(drawdown / self.peak);
        }

        self.trade_count += 1;
        if trade.realized_pnl > 0.0 {
            self.wins += 1;
            self.gross_profit += trade.realized_pnl;
        } else if trade.realized_pnl < 0.0 {
            self.losses += 1;
            self.gross_loss += -trade.realized_pnl;
        }
        self.costs_paid += trade.costs_paid;

        // Trades closed in one bar share its timestamp; never step backwards.
        let timestamp = match self.points.last() {
            Some(last) if last.timestamp > trade.exit_timestamp => last.timestamp,
            _ => trade.exit_timestamp,
        };
        let point = EquityPoint {
            timestamp,
            equity: self.equity,
            drawdown_from_peak: drawdown,
        };
        self.points.push(point);
        point
    }

    /// Latest equity point (the opening point before any trade).
    pub fn snapshot(&self) -> EquityPoint {
        self.points.last().copied().unwrap_or(EquityPoint {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            equity: self.initial_equity,
            drawdown_from_peak: 0.0,
        })
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade_count == 0 {
            return 0.0;
        }
        self.wins as f64 / self.trade_count as f64
    }

    pub fn expectancy(&self) -> f64 {
        if self.trade_count == 0 {
            return 0.0;
        }
        (self.equity - self.initial_equity) / self.trade_count as f64
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let total_pnl = self.equity - self.initial_equity;
        let total_return = if self.initial_equity > 0.0 {
            total_pnl / self.initial_equity
        } else {
            0.0
        };
        let avg = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };
        PerformanceMetrics {
            initial_equity: self.initial_equity,
            final_equity: self.equity,
            total_pnl,
            total_return,
            trade_count: self.trade_count,
            wins: self.wins,
            losses: self.losses,
            win_rate: self.win_rate(),
            expectancy: self.expectancy(),
            avg_win: avg(self.gross_profit, self.wins),
            avg_loss: avg(self.gross_loss, self.losses),
            gross_profit: self.gross_profit,
            gross_loss: self.gross_loss,
            profit_factor: (self.gross_loss > 0.0).then(|| self.gross_profit / self.gross_loss),
            max_drawdown: self.max_drawdown,
            max_drawdown_pct: self.max_drawdown_pct,
            costs_paid: self.costs_paid,
        }
    }
}
