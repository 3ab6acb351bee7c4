//! Strategy configuration: one immutable, validated value per run.
//!
//! Every component (tracker, news filter, risk manager, simulator) borrows the
//! same `StrategyConfig`. Construction goes through [`StrategyConfig::validate`]
//! so components can assume every field is in range.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config option `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("missing required config option `{0}`")]
    Missing(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Longest pre- or post-event blackout window, in minutes (one week).
pub const MAX_NEWS_WINDOW_MINUTES: i64 = 10_080;

// ── Take-profit ──

/// How the per-position take-profit distance is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitMode {
    /// Entry ± `value` pips.
    FixedPips,
    /// Entry ± `value` × ATR(period), optionally clamped in pips.
    AtrMultiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitConfig {
    pub mode: TakeProfitMode,
    pub value: f64,
    pub atr_period: usize,
    pub atr_min_pips: Option<f64>,
    pub atr_max_pips: Option<f64>,
}

impl Default for TakeProfitConfig {
    fn default() -> Self {
        Self {
            mode: TakeProfitMode::FixedPips,
            value: 15.0,
            atr_period: 14,
            atr_min_pips: None,
            atr_max_pips: None,
        }
    }
}

// ── Trading hours ──

/// Entry window in whole UTC hours, `[start_hour, end_hour)`.
///
/// `start_hour > end_hour` wraps past midnight (e.g. 22..3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TradingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    /// Whole day.
    pub fn always() -> Self {
        Self::new(0, 24)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let hour = timestamp.hour();
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// True when the bar starting at `timestamp` is the last one inside the
    /// window, i.e. the next bar (one `interval` later) falls outside it.
    pub fn is_session_end(&self, timestamp: DateTime<Utc>, interval: Duration) -> bool {
        if *self == Self::always() {
            return false;
        }
        self.contains(timestamp) && !self.contains(timestamp + interval)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour > 23 {
            return Err(ConfigError::invalid("trading_hours", "start must be in 0..=23"));
        }
        if self.end_hour > 24 {
            return Err(ConfigError::invalid("trading_hours", "end must be in 0..=24"));
        }
        if self.start_hour == self.end_hour {
            return Err(ConfigError::invalid("trading_hours", "start and end must differ"));
        }
        Ok(())
    }
}

impl Default for TradingHours {
    fn default() -> Self {
        Self::new(12, 19)
    }
}

// ── Trend ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Bars in the reference range used to establish the first bias.
    pub reference_lookback: usize,
    /// Minimum pips a counter-trend extreme must extend the current
    /// mitigation by before it replaces it.
    pub min_mitigation_step_pips: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            reference_lookback: 20,
            min_mitigation_step_pips: 0.0,
        }
    }
}

// ── Risk ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Per-candle risk target, percent of equity (0.01 = 0.01%).
    pub risk_per_candle_pct: f64,
    /// Aggregate stop budget, percent of equity (2.0 = 2%).
    pub emergency_sl_pct_of_equity: f64,
    pub min_stop_pips: f64,
    pub lot_step: f64,
    pub min_lot: f64,
    pub max_open_positions: Option<usize>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_candle_pct: 0.01,
            emergency_sl_pct_of_equity: 2.0,
            min_stop_pips: 5.0,
            lot_step: 0.01,
            min_lot: 0.01,
            max_open_positions: None,
        }
    }
}

// ── Costs ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    /// Full bid/ask spread; half is paid on each leg.
    pub spread_pips: f64,
    /// Adverse slippage per fill.
    pub slippage_pips: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            spread_pips: 1.5,
            slippage_pips: 0.0,
        }
    }
}

// ── News ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsConfig {
    pub enabled: bool,
    pub pre_window_minutes: i64,
    pub post_window_minutes: i64,
    pub full_day_blackout: bool,
    pub close_on_news: bool,
}

impl NewsConfig {
    pub fn pre_window(&self) -> Duration {
        Duration::minutes(self.pre_window_minutes)
    }

    pub fn post_window(&self) -> Duration {
        Duration::minutes(self.post_window_minutes)
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pre_window_minutes: 30,
            post_window_minutes: 30,
            full_day_blackout: false,
            close_on_news: false,
        }
    }
}

// ── Strategy ──

/// Complete per-run configuration of the strategy and its cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub initial_balance: f64,
    pub account_currency: String,
    /// Fixed quote→account rates for cross pairs, keyed by quote currency.
    pub quote_conversion_rates: BTreeMap<String, f64>,
    pub trading_hours: TradingHours,
    pub close_at_session_end: bool,
    pub trend: TrendConfig,
    pub risk: RiskConfig,
    pub take_profit: TakeProfitConfig,
    pub costs: CostConfig,
    pub news: NewsConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            account_currency: "USD".to_string(),
            quote_conversion_rates: BTreeMap::new(),
            trading_hours: TradingHours::default(),
            close_at_session_end: false,
            trend: TrendConfig::default(),
            risk: RiskConfig::default(),
            take_profit: TakeProfitConfig::default(),
            costs: CostConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Check every option's range. The first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_balance", self.initial_balance)?;
        if self.account_currency.len() != 3
            || !self.account_currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(ConfigError::invalid(
                "account_currency",
                format!("'{}' is not a three-letter currency code", self.account_currency),
            ));
        }
        for (currency, rate) in &self.quote_conversion_rates {
            if !(rate.is_finite() && *rate > 0.0) {
                return Err(ConfigError::invalid(
                    "quote_conversion_rates",
                    format!("rate for {currency} must be positive, got {rate}"),
                ));
            }
        }

        self.trading_hours.validate()?;

        if self.trend.reference_lookback == 0 {
            return Err(ConfigError::invalid("reference_lookback", "must be at least 1"));
        }
        non_negative("min_mitigation_step_pips", self.trend.min_mitigation_step_pips)?;

        let risk = &self.risk;
        percent("risk_per_candle_pct", risk.risk_per_candle_pct)?;
        percent("emergency_sl_pct_of_equity", risk.emergency_sl_pct_of_equity)?;
        if risk.risk_per_candle_pct > risk.emergency_sl_pct_of_equity {
            return Err(ConfigError::invalid(
                "risk_per_candle_pct",
                format!(
                    "{} exceeds emergency_sl_pct_of_equity {}; no position could ever open",
                    risk.risk_per_candle_pct, risk.emergency_sl_pct_of_equity
                ),
            ));
        }
        positive("min_stop_pips", risk.min_stop_pips)?;
        positive("lot_step", risk.lot_step)?;
        positive("min_lot", risk.min_lot)?;
        if risk.max_open_positions == Some(0) {
            return Err(ConfigError::invalid("max_open_positions", "must be at least 1 when set"));
        }

        let tp = &self.take_profit;
        positive("take_profit_value", tp.value)?;
        if tp.atr_period == 0 {
            return Err(ConfigError::invalid("atr_period", "must be at least 1"));
        }
        if let Some(min) = tp.atr_min_pips {
            positive("atr_tp_min_pips", min)?;
        }
        if let Some(max) = tp.atr_max_pips {
            positive("atr_tp_max_pips", max)?;
        }
        if let (Some(min), Some(max)) = (tp.atr_min_pips, tp.atr_max_pips) {
            if min > max {
                return Err(ConfigError::invalid(
                    "atr_tp_min_pips",
                    format!("{min} is greater than atr_tp_max_pips {max}"),
                ));
            }
        }

        non_negative("spread_pips", self.costs.spread_pips)?;
        non_negative("slippage_pips", self.costs.slippage_pips)?;

        news_window("pre_news_window", self.news.pre_window_minutes)?;
        news_window("post_news_window", self.news.post_window_minutes)?;

        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must not be negative, got {value}")))
    }
}

fn news_window(field: &str, minutes: i64) -> Result<(), ConfigError> {
    if (0..=MAX_NEWS_WINDOW_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be 0..={MAX_NEWS_WINDOW_MINUTES} minutes, got {minutes}"),
        ))
    }
}

fn percent(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be in (0, 100], got {value}")))
    }
}
