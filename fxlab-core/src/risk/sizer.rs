//! Position sizing.
//!
//! Each scale-in position risks a fixed fraction of equity against the
//! distance from entry to the current flip level:
//!
//! ```text
//! stop_pips = max(|entry - flip_level| / pip, min_stop_pips)
//! lots      = equity * risk_fraction / (stop_pips * pip_value_per_lot)
//! ```
//!
//! Lots are floored to the broker step and raised to the minimum lot, and the
//! position's risk is recomputed from the lots actually traded. The
//! take-profit distance plays no part in sizing.

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::domain::{QuoteConversion, STANDARD_LOT};

/// Outcome of a sizing calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeDecision {
    pub lots: f64,
    pub stop_pips: f64,
    /// Account-currency loss if price reaches the flip level, at `lots`.
    pub risk_amount: f64,
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_fraction: f64,
    min_stop_pips: f64,
    lot_step: f64,
    min_lot: f64,
    pip_size: f64,
    conversion: QuoteConversion,
}

impl PositionSizer {
    pub fn new(config: &RiskConfig, pip_size: f64, conversion: QuoteConversion) -> Self {
        Self {
            risk_fraction: config.risk_per_candle_pct / 100.0,
            min_stop_pips: config.min_stop_pips,
            lot_step: config.lot_step,
            min_lot: config.min_lot,
            pip_size,
            conversion,
        }
    }

    /// Account-currency value of one pip on one standard lot at `price`.
    ///
    /// $10 for USD-quoted pairs on a USD account.
    pub fn pip_value_per_lot(&self, price: f64) -> f64 {
        self.conversion.to_account(STANDARD_LOT * self.pip_size, price)
    }

    /// Floor to the lot step, then raise to the minimum lot.
    pub fn round_lots(&self, raw: f64) -> f64 {
        // tolerance keeps 0.03 / 0.01 from flooring to 2
        let steps = (raw / self.lot_step + 1e-9).floor();
        let lots = steps * self.lot_step;
        // trim binary noise from steps * step
        let lots = (lots * 1e8).round() / 1e8;
        if lots < self.min_lot {
            self.min_lot
        } else {
            lots
        }
    }

    /// Size a position entered at `entry_price` whose stop reference is `flip_level`.
    ///
    /// Returns `None` when equity is non-positive or the pip value is degenerate.
    pub fn size(&self, equity: f64, entry_price: f64, flip_level: f64) -> Option<SizeDecision> {
        if !(equity > 0.0) {
            return None;
        }
        let pip_value = self.pip_value_per_lot(entry_price);
        if !(pip_value.is_finite() && pip_value > 0.0) {
            return None;
        }

        let distance_pips = (entry_price - flip_level).abs() / self.pip_size;
        let stop_pips = distance_pips.max(self.min_stop_pips);
        let target = equity * self.risk_fraction;
        let lots = self.round_lots(target / (stop_pips * pip_value));

        Some(SizeDecision {
            lots,
            stop_pips,
            risk_amount: lots * stop_pips * pip_value,
        })
    }
}
