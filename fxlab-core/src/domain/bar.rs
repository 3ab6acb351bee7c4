//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLC bar for a single pair at a fixed timeframe.
///
/// Prices are the quoted (mid/bid) series from the data source. Spread is
/// modeled separately by the cost model, never baked into the bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Candle body direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleDirection {
    Bullish,
    Bearish,
    /// Open == close.
    Doji,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { timestamp, open, high, low, close }
    }

    pub fn direction(&self) -> CandleDirection {
        if self.close > self.open {
            CandleDirection::Bullish
        } else if self.close < self.open {
            CandleDirection::Bearish
        } else {
            CandleDirection::Doji
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.direction() == CandleDirection::Bullish
    }

    pub fn is_bearish(&self) -> bool {
        self.direction() == CandleDirection::Bearish
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close, prices > 0.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }

    /// Validate the bar, describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::NonFinite);
        }
        if self.low <= 0.0 {
            return Err(BarError::NonPositive { low: self.low });
        }
        if !self.is_sane() {
            return Err(BarError::Inconsistent {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar contains a non-finite price")]
    NonFinite,

    #[error("bar low {low} is not positive")]
    NonPositive { low: f64 },

    #[error("inconsistent OHLC: open={open} high={high} low={low} close={close}")]
    Inconsistent { open: f64, high: f64, low: f64, close: f64 },
}
