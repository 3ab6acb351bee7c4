//! Bar-by-bar execution simulator.
//!
//! One call to [`Simulator::step`] processes a completed bar in a fixed order:
//!
//! 1. Intrabar exits for positions open at the bar's start, in
//!    [`ExitPriority`] order (emergency stop before take-profit by default).
//! 2. Trend update with the bar.
//! 3. Reversal: on a flip, positions against the new bias close at the close.
//! 4. Session-end and news flattening at the close, when enabled.
//! 5. Entry at the close through the risk manager.
//!
//! Positions opened at a close are first exposed to the next bar's range.
//! [`Simulator::finish`] closes anything left at the last close.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::aggregator::PerformanceAggregator;
use super::cost_model::CostModel;
use super::exit_policy::{find_breach, take_profit_price, ExitCheck, ExitPriority};
use crate::config::{ConfigError, StrategyConfig, TradingHours};
use crate::domain::{Bar, Pair, Position, PositionStatus, QuoteConversion, Timeframe, Trade, STANDARD_LOT};
use crate::indicators::Atr;
use crate::news::NewsCalendar;
use crate::risk::{EntryGate, Rejection, RiskManager};
use crate::trend::{Bias, TrendState, TrendTracker};

/// Counters gathered while simulating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub bars: usize,
    pub positions_opened: usize,
    pub bias_flips: usize,
    pub news_blocked_bars: usize,
    pub emergency_stops: usize,
    /// Closed positions by terminal status name.
    pub exits: BTreeMap<String, usize>,
    pub rejections: BTreeMap<Rejection, usize>,
}

pub struct Simulator {
    pair: Pair,
    interval: Duration,
    trading_hours: TradingHours,
    close_at_session_end: bool,
    close_on_news: bool,
    conversion: QuoteConversion,
    costs: CostModel,
    exit_priority: ExitPriority,
    tracker: TrendTracker,
    calendar: Arc<NewsCalendar>,
    risk: RiskManager,
    atr: Atr,
    aggregator: PerformanceAggregator,
    bar_index: usize,
    last_bar: Option<Bar>,
    stats: SimulationStats,
}

impl Simulator {
    pub fn new(
        config: &StrategyConfig,
        pair: Pair,
        timeframe: Timeframe,
        calendar: Arc<NewsCalendar>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let conversion = pair
            .conversion(&config.account_currency, &config.quote_conversion_rates)
            .map_err(|e| ConfigError::invalid("quote_conversion_rates", e.to_string()))?;
        let costs = CostModel::new(&config.costs, pair.pip_size());

        Ok(Self {
            interval: timeframe.duration(),
            trading_hours: config.trading_hours,
            close_at_session_end: config.close_at_session_end,
            close_on_news: config.news.close_on_news,
            conversion,
            costs,
            exit_priority: ExitPriority::default(),
            tracker: TrendTracker::new(&config.trend, pair.pip_size()),
            calendar,
            risk: RiskManager::new(config, pair.clone(), conversion, costs),
            atr: Atr::new(config.take_profit.atr_period),
            aggregator: PerformanceAggregator::new(config.initial_balance),
            bar_index: 0,
            last_bar: None,
            stats: SimulationStats::default(),
            pair,
        })
    }

    pub fn with_exit_priority(mut self, priority: ExitPriority) -> Self {
        self.exit_priority = priority;
        self
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn trend_state(&self) -> TrendState {
        self.tracker.state()
    }

    pub fn open_positions(&self) -> &[Position] {
        self.risk.open_positions()
    }

    pub fn aggregator(&self) -> &PerformanceAggregator {
        &self.aggregator
    }

    pub fn equity(&self) -> f64 {
        self.aggregator.equity()
    }

    /// Bars required before the tracker can leave Undetermined.
    pub fn required_history(&self) -> usize {
        self.tracker.required_history()
    }

    pub fn stats(&self) -> SimulationStats {
        let mut stats = self.stats.clone();
        stats.bias_flips = self.tracker.flips();
        stats.rejections = self.risk.rejections().clone();
        stats
    }

    /// Advance one completed bar. Returns the trades closed during it.
    pub fn step(&mut self, bar: &Bar) -> Vec<Trade> {
        let index = self.bar_index;
        if index == 0 {
            self.aggregator.begin(bar.timestamp);
        }
        let equity_at_open = self.aggregator.equity();
        let mut closed: Vec<(Position, f64)> = Vec::new();

        // 1. Intrabar exits
        for check in self.exit_priority.sequence() {
            match check {
                ExitCheck::EmergencyStop => {
                    let budget = self.risk.emergency_sl_budget(equity_at_open);
                    if let Some(price) =
                        find_breach(self.risk.open_positions(), bar, budget, &self.costs, self.conversion)
                    {
                        let positions = self.risk.close_all(PositionStatus::ClosedByEmergencySL);
                        warn!(
                            pair = %self.pair,
                            at = %bar.timestamp,
                            price,
                            budget,
                            positions = positions.len(),
                            "emergency stop triggered"
                        );
                        self.stats.emergency_stops += 1;
                        closed.extend(positions.into_iter().map(|p| (p, price)));
                    }
                }
                ExitCheck::TakeProfit => {
                    let positions = self
                        .risk
                        .close_where(PositionStatus::ClosedByTP, |p| take_profit_price(p, bar).is_some());
                    closed.extend(positions.into_iter().map(|p| {
                        let price = take_profit_price(&p, bar).unwrap_or(p.take_profit_price);
                        (p, price)
                    }));
                }
            }
        }

        // 2. Trend
        let atr = self.atr.update(bar);
        let prior_bias = self.tracker.state().bias;
        let trend = self.tracker.update(bar);

        // 3. Reversal
        if trend.bias != prior_bias && prior_bias != Bias::Undetermined {
            if let Some(direction) = trend.bias.direction() {
                let losing = self
                    .risk
                    .close_where(PositionStatus::ClosedByReversal, |p| p.direction != direction);
                closed.extend(losing.into_iter().map(|p| (p, bar.close)));
            }
        }

        // 4. Flattening
        let session_end =
            self.close_at_session_end && self.trading_hours.is_session_end(bar.timestamp, self.interval);
        if session_end && self.risk.has_open_positions() {
            let positions = self.risk.close_all(PositionStatus::ClosedBySessionEnd);
            closed.extend(positions.into_iter().map(|p| (p, bar.close)));
        }

        let news_blocked = self.calendar.is_blocked(bar.timestamp);
        if news_blocked {
            self.stats.news_blocked_bars += 1;
            if self.close_on_news && self.risk.has_open_positions() {
                if let Some(event) = self.calendar.blocking_event(bar.timestamp) {
                    info!(pair = %self.pair, at = %bar.timestamp, event = %event.name, "closing for news");
                }
                let positions = self.risk.close_all(PositionStatus::ClosedByNews);
                closed.extend(positions.into_iter().map(|p| (p, bar.close)));
            }
        }

        let trades: Vec<Trade> = closed
            .into_iter()
            .map(|(position, market)| self.settle(position, market, index, bar))
            .collect();

        // 5. Entry
        if !session_end {
            let gate = EntryGate {
                in_trading_hours: self.trading_hours.contains(bar.timestamp),
                news_blocked,
            };
            let equity = self.aggregator.equity();
            if self.risk.maybe_open(bar, index, &trend, equity, gate, atr).is_some() {
                self.stats.positions_opened += 1;
            }
        }

        self.stats.bars += 1;
        self.bar_index += 1;
        self.last_bar = Some(*bar);
        trades
    }

    /// Close every remaining position at the last bar's close.
    pub fn finish(&mut self) -> Vec<Trade> {
        let Some(bar) = self.last_bar else {
            return Vec::new();
        };
        let index = self.bar_index.saturating_sub(1);
        let positions = self.risk.close_all(PositionStatus::ClosedAtEndOfData);
        positions
            .into_iter()
            .map(|p| self.settle(p, bar.close, index, &bar))
            .collect()
    }

    /// Fill the exit, book the trade and hand it to the aggregator.
    fn settle(&mut self, position: Position, market: f64, index: usize, bar: &Bar) -> Trade {
        let exit_price = self.costs.exit_fill(position.direction, market);
        let realized_pnl = self.conversion.to_account(position.pnl_quote(exit_price), market);
        let exit_cost = self
            .conversion
            .to_account(self.costs.per_fill() * position.size * STANDARD_LOT, market);
        let trade = Trade::from_position(
            &position,
            self.pair.symbol(),
            index,
            bar.timestamp,
            exit_price,
            realized_pnl,
            exit_cost,
        );

        debug!(
            id = %position.id,
            status = position.status.as_str(),
            at = %bar.timestamp,
            exit_price,
            pnl = realized_pnl,
            "position closed"
        );
        *self
            .stats
            .exits
            .entry(position.status.as_str().to_string())
            .or_insert(0) += 1;
        self.aggregator.record(&trade);
        trade
    }
}
