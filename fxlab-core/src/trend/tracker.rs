//! Trend/mitigation tracker.
//!
//! Bias comes from mitigation breaks. While Bullish, the tracker follows the
//! highest counter-trend (bearish) candle; a close strictly below that
//! candle's low flips the bias to Bearish. Bearish is the mirror image.
//!
//! Before any bias exists the tracker waits for `reference_lookback` bars and
//! then flips on the first close strictly outside the prior window's range.
//!
//! Mitigation levels only ratchet with the trend between flips:
//! - Bullish: `mitigation_high` and `mitigation_low` never decrease.
//! - Bearish: `mitigation_high` and `mitigation_low` never increase.
//!
//! Each flip test uses levels established by earlier bars only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::TrendConfig;
use crate::domain::{Bar, CandleDirection, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    Bullish,
    Bearish,
    Undetermined,
}

impl Bias {
    /// Direction positions take under this bias.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Bias::Bullish => Some(Direction::Long),
            Bias::Bearish => Some(Direction::Short),
            Bias::Undetermined => None,
        }
    }

    /// Candle direction aligned with the bias.
    pub fn aligned_candle(&self) -> Option<CandleDirection> {
        match self {
            Bias::Bullish => Some(CandleDirection::Bullish),
            Bias::Bearish => Some(CandleDirection::Bearish),
            Bias::Undetermined => None,
        }
    }

    /// Candle direction that counts as counter-trend under the bias.
    fn counter_candle(&self) -> Option<CandleDirection> {
        match self {
            Bias::Bullish => Some(CandleDirection::Bearish),
            Bias::Bearish => Some(CandleDirection::Bullish),
            Bias::Undetermined => None,
        }
    }
}

/// Snapshot of the tracker after a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    pub bias: Bias,
    /// High of the active mitigation candle. `None` while Undetermined.
    pub mitigation_high: Option<f64>,
    /// Low of the active mitigation candle. `None` while Undetermined.
    pub mitigation_low: Option<f64>,
    pub last_flip_timestamp: Option<DateTime<Utc>>,
}

impl TrendState {
    fn undetermined() -> Self {
        Self {
            bias: Bias::Undetermined,
            mitigation_high: None,
            mitigation_low: None,
            last_flip_timestamp: None,
        }
    }

    /// Level whose strict breach by a close flips the bias.
    pub fn flip_level(&self) -> Option<f64> {
        match self.bias {
            Bias::Bullish => self.mitigation_low,
            Bias::Bearish => self.mitigation_high,
            Bias::Undetermined => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendTracker {
    reference_lookback: usize,
    min_step: f64,
    state: TrendState,
    /// The most recent `reference_lookback` bars before the current one.
    window: VecDeque<Bar>,
    flips: usize,
}

impl TrendTracker {
    /// `pip_size` converts `min_mitigation_step_pips` into a price distance.
    pub fn new(config: &TrendConfig, pip_size: f64) -> Self {
        Self {
            reference_lookback: config.reference_lookback.max(1),
            min_step: config.min_mitigation_step_pips * pip_size,
            state: TrendState::undetermined(),
            window: VecDeque::with_capacity(config.reference_lookback + 1),
            flips: 0,
        }
    }

    pub fn state(&self) -> TrendState {
        self.state
    }

    /// Number of bias changes so far, including the first one out of Undetermined.
    pub fn flips(&self) -> usize {
        self.flips
    }

    /// Bars required before the first bias can be established.
    pub fn required_history(&self) -> usize {
        self.reference_lookback + 1
    }

    /// Advance by one closed bar.
    pub fn update(&mut self, bar: &Bar) -> TrendState {
        if let Some(new_bias) = self.flip_target(bar) {
            self.flip(new_bias, bar);
        } else {
            self.ratchet(bar);
        }

        self.window.push_back(*bar);
        if self.window.len() > self.reference_lookback {
            self.window.pop_front();
        }
        self.state
    }

    /// Bias the bar's close flips to, judged against prior levels. Ties never flip.
    fn flip_target(&self, bar: &Bar) -> Option<Bias> {
        match self.state.bias {
            Bias::Undetermined => {
                if self.window.len() < self.reference_lookback {
                    return None;
                }
                let ref_high = self.window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
                let ref_low = self.window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
                if bar.close > ref_high {
                    Some(Bias::Bullish)
                } else if bar.close < ref_low {
                    Some(Bias::Bearish)
                } else {
                    None
                }
            }
            Bias::Bullish => match self.state.mitigation_low {
                Some(low) if bar.close < low => Some(Bias::Bearish),
                _ => None,
            },
            Bias::Bearish => match self.state.mitigation_high {
                Some(high) if bar.close > high => Some(Bias::Bullish),
                _ => None,
            },
        }
    }

    fn flip(&mut self, new_bias: Bias, bar: &Bar) {
        // Most recent counter-trend candle for the new bias, the flip bar included.
        let counter = new_bias.counter_candle();
        let anchor = std::iter::once(bar)
            .chain(self.window.iter().rev())
            .find(|b| Some(b.direction()) == counter)
            .unwrap_or(bar);

        debug!(
            from = ?self.state.bias,
            to = ?new_bias,
            at = %bar.timestamp,
            close = bar.close,
            mitigation_high = anchor.high,
            mitigation_low = anchor.low,
            "bias flip"
        );

        self.state = TrendState {
            bias: new_bias,
            mitigation_high: Some(anchor.high),
            mitigation_low: Some(anchor.low),
            last_flip_timestamp: Some(bar.timestamp),
        };
        self.flips += 1;
    }

    fn ratchet(&mut self, bar: &Bar) {
        let bias = self.state.bias;
        if bias == Bias::Undetermined || Some(bar.direction()) != bias.counter_candle() {
            return;
        }
        let (Some(high), Some(low)) = (self.state.mitigation_high, self.state.mitigation_low) else {
            return;
        };

        match bias {
            Bias::Bullish if bar.high > high + self.min_step => {
                self.state.mitigation_high = Some(bar.high);
                self.state.mitigation_low = Some(low.max(bar.low));
            }
            Bias::Bearish if bar.low < low - self.min_step => {
                self.state.mitigation_low = Some(bar.low);
                self.state.mitigation_high = Some(high.min(bar.high));
            }
            _ => {}
        }
    }
}
