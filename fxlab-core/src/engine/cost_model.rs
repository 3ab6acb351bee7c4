//! Cost model: spread and slippage.
//!
//! Bars carry one quoted price series. Every fill pays half the spread plus
//! slippage, always against the trader: buys fill higher, sells fill lower.

use crate::config::CostConfig;
use crate::domain::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Half the spread, in price units.
    pub half_spread: f64,
    /// Slippage per fill, in price units.
    pub slippage: f64,
}

impl CostModel {
    pub fn new(config: &CostConfig, pip_size: f64) -> Self {
        Self {
            half_spread: config.spread_pips * pip_size / 2.0,
            slippage: config.slippage_pips * pip_size,
        }
    }

    pub fn frictionless() -> Self {
        Self {
            half_spread: 0.0,
            slippage: 0.0,
        }
    }

    /// Price distance paid on each fill.
    pub fn per_fill(&self) -> f64 {
        self.half_spread + self.slippage
    }

    /// Opening fill: a long buys above the market, a short sells below it.
    pub fn entry_fill(&self, direction: Direction, market: f64) -> f64 {
        market + direction.sign() * self.per_fill()
    }

    /// Closing fill: a long sells below the market, a short buys above it.
    pub fn exit_fill(&self, direction: Direction, market: f64) -> f64 {
        market - direction.sign() * self.per_fill()
    }
}
