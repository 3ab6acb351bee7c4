//! Currency pair metadata: pip size, contract size, account-currency conversion.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Standard lot contract size (units of base currency).
pub const STANDARD_LOT: f64 = 100_000.0;

/// A six-letter forex pair such as `EURUSD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    symbol: String,
}

impl Pair {
    pub fn new(symbol: &str) -> Result<Self, InstrumentError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.len() != 6 || !symbol.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InstrumentError::InvalidSymbol(symbol));
        }
        Ok(Self { symbol })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn base(&self) -> &str {
        &self.symbol[..3]
    }

    pub fn quote(&self) -> &str {
        &self.symbol[3..]
    }

    /// Pip size: 0.01 for JPY-quoted pairs, 0.0001 otherwise.
    pub fn pip_size(&self) -> f64 {
        if self.quote() == "JPY" {
            0.01
        } else {
            0.0001
        }
    }

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size()
    }

    pub fn price_to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size()
    }

    /// Resolve how quote-currency amounts convert into the account currency.
    pub fn conversion(
        &self,
        account_currency: &str,
        fixed_rates: &BTreeMap<String, f64>,
    ) -> Result<QuoteConversion, InstrumentError> {
        if self.quote() == account_currency {
            return Ok(QuoteConversion::Direct);
        }
        if self.base() == account_currency {
            return Ok(QuoteConversion::Inverse);
        }
        match fixed_rates.get(self.quote()) {
            Some(&rate) if rate > 0.0 => Ok(QuoteConversion::Fixed(rate)),
            _ => Err(InstrumentError::NoConversion {
                pair: self.symbol.clone(),
                account_currency: account_currency.to_string(),
            }),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

impl FromStr for Pair {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pair::new(s)
    }
}

/// Conversion of a quote-currency amount into the account currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QuoteConversion {
    /// Quote currency is the account currency (EURUSD on a USD account).
    Direct,
    /// Base currency is the account currency (USDJPY on a USD account): divide by price.
    Inverse,
    /// Cross pair: multiply by a fixed quote→account rate.
    Fixed(f64),
}

impl QuoteConversion {
    pub fn to_account(&self, amount_quote: f64, price: f64) -> f64 {
        match *self {
            QuoteConversion::Direct => amount_quote,
            QuoteConversion::Inverse => {
                if price > 0.0 {
                    amount_quote / price
                } else {
                    0.0
                }
            }
            QuoteConversion::Fixed(rate) => amount_quote * rate,
        }
    }
}

/// Bar timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(InstrumentError::InvalidTimeframe(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstrumentError {
    #[error("invalid pair symbol '{0}' (expected six letters, e.g. EURUSD)")]
    InvalidSymbol(String),

    #[error("unknown timeframe '{0}' (expected one of M1, M5, M15, M30, H1, H4, D1)")]
    InvalidTimeframe(String),

    #[error("no conversion from {pair} quote currency to {account_currency}; add a fixed rate")]
    NoConversion { pair: String, account_currency: String },
}
