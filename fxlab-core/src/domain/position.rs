use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PositionId;
use super::instrument::STANDARD_LOT;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// Lifecycle status. Every position ends in exactly one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    ClosedByTP,
    ClosedByReversal,
    ClosedByEmergencySL,
    ClosedBySessionEnd,
    ClosedByNews,
    ClosedAtEndOfData,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::ClosedByTP => "take_profit",
            PositionStatus::ClosedByReversal => "reversal",
            PositionStatus::ClosedByEmergencySL => "emergency_sl",
            PositionStatus::ClosedBySessionEnd => "session_end",
            PositionStatus::ClosedByNews => "news",
            PositionStatus::ClosedAtEndOfData => "end_of_data",
        }
    }
}

/// A single scaled-in position.
///
/// Prices are fill prices (costs already applied); `market_entry_price` keeps
/// the raw bar price the fill was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub direction: Direction,
    pub entry_price: f64,
    pub market_entry_price: f64,
    /// Size in standard lots.
    pub size: f64,
    pub take_profit_price: f64,
    pub opened_at: DateTime<Utc>,
    pub opened_bar: usize,
    pub status: PositionStatus,
    /// Flip level the stop distance was measured against at entry.
    pub stop_reference: f64,
    /// Risk budgeted for this position at entry, in account currency.
    pub risk_amount: f64,
    /// Spread + slippage paid at entry, in account currency.
    pub entry_cost: f64,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Units of base currency.
    pub fn units(&self) -> f64 {
        self.size * STANDARD_LOT
    }

    /// Profit in quote currency if closed at `exit_price`.
    pub fn pnl_quote(&self, exit_price: f64) -> f64 {
        self.direction.sign() * (exit_price - self.entry_price) * self.units()
    }

    /// Whether the bar range `[low, high]` reaches the take-profit price.
    pub fn take_profit_touched(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => high >= self.take_profit_price,
            Direction::Short => low <= self.take_profit_price,
        }
    }
}
