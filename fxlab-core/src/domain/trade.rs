//! Trade: a closed position with its realized outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PositionId;
use super::position::{Direction, Position, PositionStatus};

/// A completed round trip: entry → exit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub position_id: PositionId,
    pub pair: String,
    pub direction: Direction,
    pub status: PositionStatus,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub take_profit_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_timestamp: DateTime<Utc>,
    pub exit_price: f64,

    // ── Size ──
    pub size: f64,
    pub risk_amount: f64,

    // ── PnL (account currency) ──
    /// Net of spread and slippage on both legs.
    pub realized_pnl: f64,
    pub costs_paid: f64,
}

impl Trade {
    /// Build the trade record from the closing position snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn from_position(
        position: &Position,
        pair: &str,
        exit_bar: usize,
        exit_timestamp: DateTime<Utc>,
        exit_price: f64,
        realized_pnl: f64,
        exit_cost: f64,
    ) -> Self {
        Self {
            position_id: position.id,
            pair: pair.to_string(),
            direction: position.direction,
            status: position.status,
            entry_bar: position.opened_bar,
            entry_timestamp: position.opened_at,
            entry_price: position.entry_price,
            take_profit_price: position.take_profit_price,
            exit_bar,
            exit_timestamp,
            exit_price,
            size: position.size,
            risk_amount: position.risk_amount,
            realized_pnl,
            costs_paid: position.entry_cost + exit_cost,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }

    /// P&L in units of the risk budgeted at entry (R multiple).
    pub fn r_multiple(&self) -> f64 {
        if self.risk_amount <= 0.0 {
            return 0.0;
        }
        self.realized_pnl / self.risk_amount
    }
}
