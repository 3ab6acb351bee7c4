//! TOML backtest configuration.
//!
//! The file is flat: one key per strategy option plus the dataset and news
//! sources. [`BacktestConfig::to_strategy_config`] maps it onto the core
//! [`StrategyConfig`] every component borrows.
//!
//! ```toml
//! pairs = ["EURUSD", "USDJPY"]
//! timeframe = "M15"
//! data_dir = "data"
//! risk_per_candle_pct = 0.01
//! emergency_sl_pct_of_equity = 2.0
//! take_profit_mode = "fixed_pips"
//! take_profit_value = 15.0
//! trading_hours = { start = 12, end = 19 }
//! news_filter_enabled = true
//! news_file = "news.csv"
//! pre_news_window = 30
//! post_news_window = 30
//! spread_pips = 1.5
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fxlab_core::config::{
    CostConfig, NewsConfig, RiskConfig, StrategyConfig, TakeProfitConfig, TakeProfitMode, TradingHours,
    TrendConfig,
};
use fxlab_core::domain::{Pair, Timeframe};
use fxlab_core::engine::ExitPriority;

pub use fxlab_core::config::ConfigError;

/// `trading_hours = { start = 12, end = 19 }`, whole UTC hours, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoursConfig {
    pub start: u32,
    pub end: u32,
}

/// An explicitly listed bar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub pair: String,
    pub path: PathBuf,
    /// Defaults to the file stem.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    // ── Universe and data ──
    pub pairs: Vec<String>,
    pub timeframe: Timeframe,
    /// Searched for `{PAIR}_{TIMEFRAME}*.csv` when `datasets` is empty.
    pub data_dir: PathBuf,
    pub datasets: Vec<DatasetConfig>,
    pub max_missing_bars: usize,

    // ── Account ──
    pub initial_balance: f64,
    pub account_currency: String,
    pub quote_conversion_rates: BTreeMap<String, f64>,

    // ── Trend ──
    pub reference_lookback: usize,
    pub min_mitigation_step_pips: f64,

    // ── Risk ──
    pub risk_per_candle_pct: f64,
    pub emergency_sl_pct_of_equity: f64,
    pub min_stop_pips: f64,
    pub lot_step: f64,
    pub min_lot: f64,
    pub max_open_positions: Option<usize>,

    // ── Take-profit ──
    pub take_profit_mode: TakeProfitMode,
    pub take_profit_value: f64,
    pub atr_period: usize,
    pub atr_tp_min_pips: Option<f64>,
    pub atr_tp_max_pips: Option<f64>,

    // ── Session ──
    pub trading_hours: HoursConfig,
    pub close_at_session_end: bool,

    // ── News ──
    pub news_filter_enabled: bool,
    pub news_file: Option<PathBuf>,
    pub news_recurring_years: Vec<i32>,
    pub pre_news_window: i64,
    pub post_news_window: i64,
    pub full_day_blackout: bool,
    pub close_on_news: bool,

    // ── Costs ──
    pub spread_pips: f64,
    pub slippage_pips: f64,

    // ── Execution ──
    pub exit_priority: ExitPriority,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        let strategy = StrategyConfig::default();
        Self {
            pairs: Vec::new(),
            timeframe: Timeframe::M15,
            data_dir: PathBuf::from("data"),
            datasets: Vec::new(),
            max_missing_bars: 0,
            initial_balance: strategy.initial_balance,
            account_currency: strategy.account_currency,
            quote_conversion_rates: BTreeMap::new(),
            reference_lookback: strategy.trend.reference_lookback,
            min_mitigation_step_pips: strategy.trend.min_mitigation_step_pips,
            risk_per_candle_pct: strategy.risk.risk_per_candle_pct,
            emergency_sl_pct_of_equity: strategy.risk.emergency_sl_pct_of_equity,
            min_stop_pips: strategy.risk.min_stop_pips,
            lot_step: strategy.risk.lot_step,
            min_lot: strategy.risk.min_lot,
            max_open_positions: strategy.risk.max_open_positions,
            take_profit_mode: strategy.take_profit.mode,
            take_profit_value: strategy.take_profit.value,
            atr_period: strategy.take_profit.atr_period,
            atr_tp_min_pips: None,
            atr_tp_max_pips: None,
            trading_hours: HoursConfig {
                start: strategy.trading_hours.start_hour,
                end: strategy.trading_hours.end_hour,
            },
            close_at_session_end: strategy.close_at_session_end,
            news_filter_enabled: strategy.news.enabled,
            news_file: None,
            news_recurring_years: Vec::new(),
            pre_news_window: strategy.news.pre_window_minutes,
            post_news_window: strategy.news.post_window_minutes,
            full_day_blackout: strategy.news.full_day_blackout,
            close_on_news: strategy.news.close_on_news,
            spread_pips: strategy.costs.spread_pips,
            slippage_pips: strategy.costs.slippage_pips,
            exit_priority: ExitPriority::default(),
        }
    }
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a config file. Relative `data_dir`, dataset and news
    /// paths resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        self.data_dir = resolve(&self.data_dir);
        for ds in &mut self.datasets {
            ds.path = resolve(&ds.path);
        }
        if let Some(news) = &self.news_file {
            self.news_file = Some(resolve(news));
        }
    }

    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            initial_balance: self.initial_balance,
            account_currency: self.account_currency.to_ascii_uppercase(),
            quote_conversion_rates: self
                .quote_conversion_rates
                .iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), *v))
                .collect(),
            trading_hours: TradingHours::new(self.trading_hours.start, self.trading_hours.end),
            close_at_session_end: self.close_at_session_end,
            trend: TrendConfig {
                reference_lookback: self.reference_lookback,
                min_mitigation_step_pips: self.min_mitigation_step_pips,
            },
            risk: RiskConfig {
                risk_per_candle_pct: self.risk_per_candle_pct,
                emergency_sl_pct_of_equity: self.emergency_sl_pct_of_equity,
                min_stop_pips: self.min_stop_pips,
                lot_step: self.lot_step,
                min_lot: self.min_lot,
                max_open_positions: self.max_open_positions,
            },
            take_profit: TakeProfitConfig {
                mode: self.take_profit_mode,
                value: self.take_profit_value,
                atr_period: self.atr_period,
                atr_min_pips: self.atr_tp_min_pips,
                atr_max_pips: self.atr_tp_max_pips,
            },
            costs: CostConfig {
                spread_pips: self.spread_pips,
                slippage_pips: self.slippage_pips,
            },
            news: NewsConfig {
                enabled: self.news_filter_enabled,
                pre_window_minutes: self.pre_news_window,
                post_window_minutes: self.post_news_window,
                full_day_blackout: self.full_day_blackout,
                close_on_news: self.close_on_news,
            },
        }
    }

    /// Parsed, de-duplicated pairs in configuration order.
    pub fn pairs(&self) -> Result<Vec<Pair>, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut pairs = Vec::new();
        for symbol in &self.pairs {
            let pair = Pair::new(symbol).map_err(|e| ConfigError::invalid("pairs", e.to_string()))?;
            if seen.insert(pair.symbol().to_string()) {
                pairs.push(pair);
            }
        }
        Ok(pairs)
    }

    /// Everything a run needs before touching data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs.is_empty() {
            return Err(ConfigError::Missing("pairs".into()));
        }
        let pairs = self.pairs()?;
        let strategy = self.to_strategy_config();
        strategy.validate()?;

        for pair in &pairs {
            pair.conversion(&strategy.account_currency, &strategy.quote_conversion_rates)
                .map_err(|e| ConfigError::invalid("quote_conversion_rates", e.to_string()))?;
        }

        for ds in &self.datasets {
            let pair = Pair::new(&ds.pair).map_err(|e| ConfigError::invalid("datasets", e.to_string()))?;
            if !pairs.contains(&pair) {
                return Err(ConfigError::invalid(
                    "datasets",
                    format!("{} is not listed in pairs", pair),
                ));
            }
        }

        for year in &self.news_recurring_years {
            if !(1970..=2100).contains(year) {
                return Err(ConfigError::invalid(
                    "news_recurring_years",
                    format!("{year} is out of range"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
pairs = ["eurusd"]
"#;

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = BacktestConfig::from_toml_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.timeframe, Timeframe::M15);
        assert_eq!(cfg.to_strategy_config(), StrategyConfig::default());
        assert_eq!(cfg.pairs().unwrap()[0].symbol(), "EURUSD");
    }

    #[test]
    fn full_config_maps_every_option() {
        let toml = r#"
pairs = ["EURUSD", "EURGBP"]
timeframe = "H1"
initial_balance = 50000.0
account_currency = "usd"
quote_conversion_rates = { GBP = 1.27 }
reference_lookback = 30
min_mitigation_step_pips = 1.5
risk_per_candle_pct = 0.05
emergency_sl_pct_of_equity = 3.0
min_stop_pips = 8.0
max_open_positions = 12
take_profit_mode = "atr_multiple"
take_profit_value = 1.5
atr_period = 21
atr_tp_min_pips = 10.0
atr_tp_max_pips = 40.0
trading_hours = { start = 7, end = 16 }
close_at_session_end = true
news_filter_enabled = true
pre_news_window = 15
post_news_window = 45
full_day_blackout = true
close_on_news = true
spread_pips = 0.8
slippage_pips = 0.2
exit_priority = "take_profit_first"
"#;
        let cfg = BacktestConfig::from_toml_str(toml).unwrap();
        cfg.validate().unwrap();
        let s = cfg.to_strategy_config();
        assert_eq!(s.account_currency, "USD");
        assert_eq!(s.quote_conversion_rates.get("GBP"), Some(&1.27));
        assert_eq!(s.trend.reference_lookback, 30);
        assert_eq!(s.risk.max_open_positions, Some(12));
        assert_eq!(s.take_profit.mode, TakeProfitMode::AtrMultiple);
        assert_eq!(s.take_profit.atr_max_pips, Some(40.0));
        assert_eq!(s.trading_hours, TradingHours::new(7, 16));
        assert_eq!(s.news.post_window_minutes, 45);
        assert!(s.news.full_day_blackout && s.news.close_on_news);
        assert_eq!(cfg.exit_priority, ExitPriority::TakeProfitFirst);
        assert_eq!(cfg.timeframe, Timeframe::H1);
    }

    #[test]
    fn missing_pairs_and_unknown_keys_fail() {
        let cfg = BacktestConfig::from_toml_str("timeframe = \"M15\"").unwrap();
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("pairs".into())));

        let err = BacktestConfig::from_toml_str("pairs = [\"EURUSD\"]\nrisk_per_candel_pct = 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_values_name_the_option() {
        let cfg = BacktestConfig::from_toml_str("pairs = [\"EURUSD\"]\npre_news_window = -5").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConfig { ref field, .. }) if field == "pre_news_window"
        ));

        let cfg = BacktestConfig::from_toml_str("pairs = [\"EURGBP\"]").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConfig { ref field, .. }) if field == "quote_conversion_rates"
        ));

        let cfg = BacktestConfig::from_toml_str("pairs = [\"EURUSD\"]\ntrading_hours = { start = 25, end = 3 }").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn datasets_must_belong_to_listed_pairs() {
        let toml = r#"
pairs = ["EURUSD"]
[[datasets]]
pair = "GBPUSD"
path = "GBPUSD_M15.csv"
"#;
        let cfg = BacktestConfig::from_toml_str(toml).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConfig { ref field, .. }) if field == "datasets"
        ));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt.toml");
        std::fs::write(&path, "pairs = [\"EURUSD\"]\nnews_file = \"news.csv\"\n").unwrap();
        let cfg = BacktestConfig::load(&path).unwrap();
        assert_eq!(cfg.data_dir, dir.path().join("data"));
        assert_eq!(cfg.news_file, Some(dir.path().join("news.csv")));
    }
}
