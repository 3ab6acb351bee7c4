//! Risk manager: entry gating, sizing, take-profit placement and ownership of
//! the open scale-in positions.
//!
//! The aggregate stop budget is a fraction of equity shared by every open
//! position. A new position opens only when the risk already deployed plus
//! its own fits inside that budget.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::sizer::PositionSizer;
use crate::config::{RiskConfig, StrategyConfig, TakeProfitConfig, TakeProfitMode};
use crate::domain::{Bar, IdGen, Pair, Position, PositionStatus, QuoteConversion};
use crate::engine::cost_model::CostModel;
use crate::trend::TrendState;

/// Entry permissions from the session clock and the news calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryGate {
    pub in_trading_hours: bool,
    pub news_blocked: bool,
}

impl EntryGate {
    pub fn open() -> Self {
        Self {
            in_trading_hours: true,
            news_blocked: false,
        }
    }
}

/// Why a bar did not produce a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NonPositiveEquity,
    Undetermined,
    CandleNotAligned,
    OutsideTradingHours,
    NewsBlackout,
    MaxOpenPositions,
    AtrWarmup,
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    pair: Pair,
    risk: RiskConfig,
    take_profit: TakeProfitConfig,
    sizer: PositionSizer,
    costs: CostModel,
    conversion: QuoteConversion,
    ids: IdGen,
    open: Vec<Position>,
    rejections: BTreeMap<Rejection, usize>,
}

impl RiskManager {
    pub fn new(config: &StrategyConfig, pair: Pair, conversion: QuoteConversion, costs: CostModel) -> Self {
        let sizer = PositionSizer::new(&config.risk, pair.pip_size(), conversion);
        Self {
            pair,
            risk: config.risk.clone(),
            take_profit: config.take_profit.clone(),
            sizer,
            costs,
            conversion,
            ids: IdGen::default(),
            open: Vec::new(),
            rejections: BTreeMap::new(),
        }
    }

    /// Aggregate loss allowed across all open positions.
    pub fn emergency_sl_budget(&self, equity: f64) -> f64 {
        self.risk.emergency_sl_pct_of_equity / 100.0 * equity.max(0.0)
    }

    /// Sum of `risk_amount` over open positions.
    pub fn open_risk(&self) -> f64 {
        self.open.iter().map(|p| p.risk_amount).sum()
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    pub fn has_open_positions(&self) -> bool {
        !self.open.is_empty()
    }

    /// Count of entries refused, by reason.
    pub fn rejections(&self) -> &BTreeMap<Rejection, usize> {
        &self.rejections
    }

    /// Open one more position at the bar's close if every precondition holds.
    ///
    /// `atr` is the current ATR value (required only in ATR take-profit mode).
    pub fn maybe_open(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        trend: &TrendState,
        equity: f64,
        gate: EntryGate,
        atr: Option<f64>,
    ) -> Option<Position> {
        match self.try_open(bar, bar_index, trend, equity, gate, atr) {
            Ok(position) => Some(position),
            Err(reason) => {
                trace!(at = %bar.timestamp, ?reason, "entry rejected");
                *self.rejections.entry(reason).or_insert(0) += 1;
                None
            }
        }
    }

    fn try_open(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        trend: &TrendState,
        equity: f64,
        gate: EntryGate,
        atr: Option<f64>,
    ) -> Result<Position, Rejection> {
        if !(equity > 0.0) {
            return Err(Rejection::NonPositiveEquity);
        }
        let direction = trend.bias.direction().ok_or(Rejection::Undetermined)?;
        let flip_level = trend.flip_level().ok_or(Rejection::Undetermined)?;
        if Some(bar.direction()) != trend.bias.aligned_candle() {
            return Err(Rejection::CandleNotAligned);
        }
        if !gate.in_trading_hours {
            return Err(Rejection::OutsideTradingHours);
        }
        if gate.news_blocked {
            return Err(Rejection::NewsBlackout);
        }
        if let Some(max) = self.risk.max_open_positions {
            if self.open.len() >= max {
                return Err(Rejection::MaxOpenPositions);
            }
        }

        let tp_distance = self.take_profit_distance(atr).ok_or(Rejection::AtrWarmup)?;
        let entry_price = self.costs.entry_fill(direction, bar.close);
        let decision = self
            .sizer
            .size(equity, entry_price, flip_level)
            .ok_or(Rejection::NonPositiveEquity)?;

        let budget = self.emergency_sl_budget(equity);
        let deployed = self.open_risk();
        // tolerance for float noise at the exact budget edge
        if deployed + decision.risk_amount > budget * (1.0 + 1e-12) {
            return Err(Rejection::BudgetExhausted);
        }

        let units = decision.lots * crate::domain::STANDARD_LOT;
        let entry_cost = self
            .conversion
            .to_account(self.costs.per_fill() * units, bar.close);
        let position = Position {
            id: self.ids.next_position_id(),
            direction,
            entry_price,
            market_entry_price: bar.close,
            size: decision.lots,
            take_profit_price: entry_price + direction.sign() * tp_distance,
            opened_at: bar.timestamp,
            opened_bar: bar_index,
            status: PositionStatus::Open,
            stop_reference: flip_level,
            risk_amount: decision.risk_amount,
            entry_cost,
        };

        debug!(
            id = %position.id,
            direction = ?direction,
            at = %bar.timestamp,
            price = entry_price,
            lots = decision.lots,
            stop_pips = decision.stop_pips,
            risk = decision.risk_amount,
            open_risk = deployed + decision.risk_amount,
            budget,
            "position opened"
        );
        self.open.push(position.clone());
        Ok(position)
    }

    /// Take-profit distance in price units, or `None` while ATR is warming up.
    fn take_profit_distance(&self, atr: Option<f64>) -> Option<f64> {
        let tp = &self.take_profit;
        match tp.mode {
            TakeProfitMode::FixedPips => Some(self.pair.pips_to_price(tp.value)),
            TakeProfitMode::AtrMultiple => {
                let atr = atr.filter(|a| a.is_finite() && *a > 0.0)?;
                let mut pips = self.pair.price_to_pips(tp.value * atr);
                if let Some(min) = tp.atr_min_pips {
                    pips = pips.max(min);
                }
                if let Some(max) = tp.atr_max_pips {
                    pips = pips.min(max);
                }
                Some(self.pair.pips_to_price(pips))
            }
        }
    }

    /// Remove and return every open position matching `predicate`, stamped
    /// with the terminal `status`. Order of opening is preserved.
    pub fn close_where<F>(&mut self, status: PositionStatus, mut predicate: F) -> Vec<Position>
    where
        F: FnMut(&Position) -> bool,
    {
        let mut closed = Vec::new();
        let mut kept = Vec::with_capacity(self.open.len());
        for mut position in self.open.drain(..) {
            if predicate(&position) {
                position.status = status;
                closed.push(position);
            } else {
                kept.push(position);
            }
        }
        self.open = kept;
        closed
    }

    /// Close every open position with `status`.
    pub fn close_all(&mut self, status: PositionStatus) -> Vec<Position> {
        self.close_where(status, |_| true)
    }
}
