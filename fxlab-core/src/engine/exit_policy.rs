//! Intrabar exit policy.
//!
//! OHLC does not say whether a bar's high or low came first. When one bar
//! reaches both a take-profit and the aggregate emergency stop, the policy
//! decides which check runs first. `EmergencyFirst` is the conservative
//! default; `TakeProfitFirst` exists to measure how much that assumption costs.

use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;
use crate::domain::{Bar, Direction, Position, QuoteConversion};

/// Bisection iterations for the breach price; far below a pipette after 60.
const BREACH_ITERATIONS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPriority {
    /// Emergency stop before take-profit (worst case).
    #[default]
    EmergencyFirst,
    /// Take-profit before emergency stop (best case).
    TakeProfitFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCheck {
    EmergencyStop,
    TakeProfit,
}

impl ExitPriority {
    pub fn sequence(&self) -> [ExitCheck; 2] {
        match self {
            ExitPriority::EmergencyFirst => [ExitCheck::EmergencyStop, ExitCheck::TakeProfit],
            ExitPriority::TakeProfitFirst => [ExitCheck::TakeProfit, ExitCheck::EmergencyStop],
        }
    }
}

/// Aggregate account-currency loss of `positions` if all were closed at
/// `market`, exit costs included. Negative when the book is in profit.
pub fn aggregate_loss(
    positions: &[Position],
    market: f64,
    costs: &CostModel,
    conversion: QuoteConversion,
) -> f64 {
    -positions
        .iter()
        .map(|p| conversion.to_account(p.pnl_quote(costs.exit_fill(p.direction, market)), market))
        .sum::<f64>()
}

/// Market price at which the aggregate loss first exceeds `budget` inside
/// `bar`, or `None` if it never does.
///
/// The path runs from the open toward whichever extreme hurts the book more.
/// If the open is already past the budget (a gap) the breach is at the open.
pub fn find_breach(
    positions: &[Position],
    bar: &Bar,
    budget: f64,
    costs: &CostModel,
    conversion: QuoteConversion,
) -> Option<f64> {
    if positions.is_empty() {
        return None;
    }
    let loss = |price: f64| aggregate_loss(positions, price, costs, conversion);

    if loss(bar.open) > budget {
        return Some(bar.open);
    }
    let adverse = if loss(bar.low) >= loss(bar.high) { bar.low } else { bar.high };
    if loss(adverse) <= budget {
        return None;
    }

    // loss(safe) <= budget < loss(breached)
    let mut safe = bar.open;
    let mut breached = adverse;
    for _ in 0..BREACH_ITERATIONS {
        let mid = 0.5 * (safe + breached);
        if loss(mid) > budget {
            breached = mid;
        } else {
            safe = mid;
        }
    }
    Some(breached)
}

/// Market price a position's take-profit fills at in `bar`, if reached.
///
/// A bar that opens beyond the target fills at the open.
pub fn take_profit_price(position: &Position, bar: &Bar) -> Option<f64> {
    let tp = position.take_profit_price;
    match position.direction {
        Direction::Long if bar.open >= tp => Some(bar.open),
        Direction::Short if bar.open <= tp => Some(bar.open),
        _ if position.take_profit_touched(bar.high, bar.low) => Some(tp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PositionId, PositionStatus};
    use chrono::{TimeZone, Utc};

    fn long(entry: f64, lots: f64, tp: f64) -> Position {
        Position {
            id: PositionId(1),
            direction: Direction::Long,
            entry_price: entry,
            market_entry_price: entry,
            size: lots,
            take_profit_price: tp,
            opened_at: Utc.with_ymd_and_hms(2025, 11, 4, 13, 0, 0).unwrap(),
            opened_bar: 0,
            status: PositionStatus::Open,
            stop_reference: entry - 0.0020,
            risk_amount: 0.0,
            entry_cost: 0.0,
        }
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(Utc.with_ymd_and_hms(2025, 11, 4, 13, 15, 0).unwrap(), open, high, low, close)
    }

    #[test]
    fn emergency_first_is_default() {
        assert_eq!(
            ExitPriority::default().sequence(),
            [ExitCheck::EmergencyStop, ExitCheck::TakeProfit]
        );
    }

    #[test]
    fn aggregate_loss_includes_exit_costs() {
        let costs = CostModel { half_spread: 0.0001, slippage: 0.0 };
        // 1 lot long from 1.1000, exit fill at 1.0999 → loss 10 USD
        let loss = aggregate_loss(&[long(1.1000, 1.0, 1.1015)], 1.1000, &costs, QuoteConversion::Direct);
        assert!((loss - 10.0).abs() < 1e-6);
    }

    #[test]
    fn breach_found_by_bisection() {
        let costs = CostModel::frictionless();
        let positions = [long(1.1000, 1.0, 1.1050)];
        // budget 20 USD = 20 pips on 1 lot → breach at 1.0980
        let b = bar(1.1000, 1.1005, 1.0970, 1.0990);
        let price = find_breach(&positions, &b, 20.0, &costs, QuoteConversion::Direct).unwrap();
        assert!((price - 1.0980).abs() < 1e-9);
    }

    #[test]
    fn gap_through_budget_fills_at_open() {
        let costs = CostModel::frictionless();
        let positions = [long(1.1000, 1.0, 1.1050)];
        let b = bar(1.0950, 1.0960, 1.0940, 1.0955);
        let price = find_breach(&positions, &b, 20.0, &costs, QuoteConversion::Direct).unwrap();
        assert_eq!(price, 1.0950);
    }

    #[test]
    fn no_breach_inside_budget() {
        let costs = CostModel::frictionless();
        let positions = [long(1.1000, 1.0, 1.1050)];
        let b = bar(1.1000, 1.1005, 1.0985, 1.0990);
        assert!(find_breach(&positions, &b, 20.0, &costs, QuoteConversion::Direct).is_none());
        assert!(find_breach(&[], &b, 20.0, &costs, QuoteConversion::Direct).is_none());
    }

    #[test]
    fn take_profit_touch_and_gap() {
        let pos = long(1.1000, 0.1, 1.1015);
        assert_eq!(take_profit_price(&pos, &bar(1.1005, 1.1016, 1.1000, 1.1010)), Some(1.1015));
        assert_eq!(take_profit_price(&pos, &bar(1.1020, 1.1025, 1.1018, 1.1022)), Some(1.1020));
        assert_eq!(take_profit_price(&pos, &bar(1.1005, 1.1014, 1.1000, 1.1010)), None);
    }
}
