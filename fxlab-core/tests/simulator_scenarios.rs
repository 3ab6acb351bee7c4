//! End-to-end behaviour of the simulator on hand-built bar sequences.
//!
//! Every sequence starts Monday 2025-11-03 00:00 UTC on M15 bars, EURUSD on a
//! USD account, frictionless fills, two-bar reference range.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use fxlab_core::config::{NewsConfig, StrategyConfig, TakeProfitMode, TradingHours};
use fxlab_core::data::DataError;
use fxlab_core::domain::{Bar, Direction, Pair, PositionStatus, Timeframe, Trade};
use fxlab_core::engine::{run_backtest, BacktestError, ExitPriority, Simulator};
use fxlab_core::news::{Impact, NewsCalendar, NewsEvent};
use fxlab_core::risk::Rejection;
use fxlab_core::trend::Bias;

// ── Fixtures ─────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap()
}

fn at_bar(i: usize) -> DateTime<Utc> {
    t0() + Duration::minutes(15 * i as i64)
}

fn bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::new(at_bar(i), o, h, l, c))
        .collect()
}

fn eurusd() -> Pair {
    Pair::new("EURUSD").unwrap()
}

/// 1% per candle against a 2% aggregate budget.
fn config(tp_pips: f64) -> StrategyConfig {
    let mut cfg = StrategyConfig::default();
    cfg.trading_hours = TradingHours::always();
    cfg.trend.reference_lookback = 2;
    cfg.risk.risk_per_candle_pct = 1.0;
    cfg.risk.emergency_sl_pct_of_equity = 2.0;
    cfg.take_profit.mode = TakeProfitMode::FixedPips;
    cfg.take_profit.value = tp_pips;
    cfg.costs.spread_pips = 0.0;
    cfg.costs.slippage_pips = 0.0;
    cfg
}

/// Reference range [1.0990, 1.1010], ending on a bearish then bullish candle.
fn reference() -> Vec<(f64, f64, f64, f64)> {
    vec![
        (1.1000, 1.1010, 1.0990, 1.0995),
        (1.0995, 1.1005, 1.0990, 1.1000),
    ]
}

/// Reference range followed by `n` bullish bars climbing 10 pips each.
/// The first climbing bar closes at 1.1020 and flips the bias.
fn uptrend(n: usize) -> Vec<Bar> {
    let mut data = reference();
    for k in 0..n {
        let p = 1.1010 + 0.0010 * k as f64;
        data.push((p, p + 0.0012, p - 0.0002, p + 0.0010));
    }
    bars(&data)
}

fn simulator(cfg: &StrategyConfig, calendar: NewsCalendar) -> Simulator {
    Simulator::new(cfg, eurusd(), Timeframe::M15, Arc::new(calendar)).unwrap()
}

fn step_all(sim: &mut Simulator, bars: &[Bar]) -> Vec<Trade> {
    let mut trades = Vec::new();
    for bar in bars {
        trades.extend(sim.step(bar));
    }
    trades
}

// ── Scenario A: flat market ──────────────────────────────────────────

#[test]
fn oscillating_market_never_trades() {
    let mut data = Vec::new();
    for i in 0..40 {
        if i % 2 == 0 {
            data.push((1.1000, 1.1010, 1.0990, 1.1005));
        } else {
            data.push((1.1005, 1.1010, 1.0990, 1.0995));
        }
    }
    let cfg = config(15.0);
    let result = run_backtest(&bars(&data), &eurusd(), Timeframe::M15, &cfg, Arc::new(NewsCalendar::disabled()))
        .unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.stats.positions_opened, 0);
    assert_eq!(result.stats.bias_flips, 0);
    assert_eq!(result.final_trend.bias, Bias::Undetermined);
    assert_eq!(result.metrics.trade_count, 0);
    assert_eq!(result.metrics.final_equity, 10_000.0);
    assert_eq!(result.equity_curve.len(), 1);
    assert_eq!(result.stats.rejections.get(&Rejection::Undetermined), Some(&40));
}

// ── Scenario B: sustained up-move ────────────────────────────────────

#[test]
fn uptrend_flips_once_and_scales_in_until_budget_is_spent() {
    let cfg = config(500.0);
    let mut sim = simulator(&cfg, NewsCalendar::disabled());
    let data = uptrend(10);
    step_all(&mut sim, &data);

    let state = sim.trend_state();
    assert_eq!(state.bias, Bias::Bullish);
    assert_eq!(state.last_flip_timestamp, Some(at_bar(2)));
    assert_eq!(state.mitigation_low, Some(1.0990));

    let open = sim.open_positions();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|p| p.direction == Direction::Long));
    assert_eq!(open[0].opened_bar, 2);
    assert_eq!(open[1].opened_bar, 3);
    assert!((open[0].size - 0.33).abs() < 1e-9);

    let deployed: f64 = open.iter().map(|p| p.risk_amount).sum();
    assert!(deployed <= 200.0 + 1e-9);

    let stats = sim.stats();
    assert_eq!(stats.bias_flips, 1);
    assert_eq!(stats.positions_opened, 2);
    assert_eq!(stats.rejections.get(&Rejection::BudgetExhausted), Some(&8));

    let trades = sim.finish();
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.status == PositionStatus::ClosedAtEndOfData));
    assert!(trades.iter().all(|t| t.realized_pnl > 0.0));
    assert!(sim.equity() > 10_000.0);
    assert!(sim.open_positions().is_empty());
}

// ── Scenario C: TP and emergency stop in one bar ─────────────────────

/// Opens 0.33 lots long at 1.1020 (TP 1.1040), then a bar that reaches
/// 1.1045 and 1.0950. At 1.0950 the loss is 231 USD against a 200 USD budget.
fn wide_bar_sequence() -> Vec<Bar> {
    let mut data = reference();
    data.push((1.1010, 1.1022, 1.1008, 1.1020));
    data.push((1.1020, 1.1045, 1.0950, 1.1000));
    bars(&data)
}

#[test]
fn emergency_stop_wins_over_take_profit_in_the_same_bar() {
    let cfg = config(20.0);
    let mut sim = simulator(&cfg, NewsCalendar::disabled());
    let data = wide_bar_sequence();
    let trades = step_all(&mut sim, &data);

    assert_eq!(trades.len(), 1);
    let trade = &trades[0];
    assert_eq!(trade.status, PositionStatus::ClosedByEmergencySL);
    assert_eq!(trade.exit_bar, 3);
    // 33_000 units lose 200 USD at 1.1020 - 200 / 33_000
    assert!((trade.exit_price - (1.1020 - 200.0 / 33_000.0)).abs() < 1e-9);
    assert!((trade.realized_pnl + 200.0).abs() < 1e-6);
    assert_eq!(sim.stats().emergency_stops, 1);
    assert!(sim.open_positions().is_empty());
}

#[test]
fn take_profit_first_priority_books_the_target_instead() {
    let cfg = config(20.0);
    let mut sim = simulator(&cfg, NewsCalendar::disabled()).with_exit_priority(ExitPriority::TakeProfitFirst);
    let trades = step_all(&mut sim, &wide_bar_sequence());

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, PositionStatus::ClosedByTP);
    assert!((trades[0].exit_price - 1.1040).abs() < 1e-12);
    assert!((trades[0].realized_pnl - 66.0).abs() < 1e-6);
    assert_eq!(sim.stats().emergency_stops, 0);
}

// ── Scenario D/E: news blackout ──────────────────────────────────────

fn news_at(ts: DateTime<Utc>) -> Vec<NewsEvent> {
    vec![NewsEvent::new(ts, Impact::High, "CPI m/m")]
}

#[test]
fn blackout_boundaries_are_inclusive_to_the_minute() {
    let event = Utc.with_ymd_and_hms(2025, 11, 13, 13, 30, 0).unwrap();
    let calendar = NewsCalendar::new(news_at(event), &NewsConfig::default());

    assert!(calendar.is_blocked(event - Duration::minutes(30)));
    assert!(!calendar.is_blocked(event - Duration::minutes(31)));
    assert!(calendar.is_blocked(event + Duration::minutes(30)));
    assert!(!calendar.is_blocked(event + Duration::minutes(31)));
}

#[test]
fn blackout_delays_the_first_entry() {
    let cfg = config(500.0);
    // 00:45 ± 30 min covers bars 1..=5; bar 1 is still Undetermined
    let calendar = NewsCalendar::new(news_at(at_bar(3)), &cfg.news);
    let mut sim = simulator(&cfg, calendar);
    step_all(&mut sim, &uptrend(10));

    let stats = sim.stats();
    assert_eq!(stats.news_blocked_bars, 5);
    assert_eq!(stats.rejections.get(&Rejection::NewsBlackout), Some(&4));
    assert_eq!(sim.open_positions()[0].opened_bar, 6);
}

#[test]
fn disabled_news_filter_never_blocks() {
    let mut cfg = config(500.0);
    cfg.news.enabled = false;
    let calendar = NewsCalendar::new(news_at(at_bar(3)), &cfg.news);
    assert!(!calendar.is_blocked(at_bar(3)));

    let mut sim = simulator(&cfg, calendar);
    step_all(&mut sim, &uptrend(10));
    let stats = sim.stats();
    assert_eq!(stats.news_blocked_bars, 0);
    assert!(!stats.rejections.contains_key(&Rejection::NewsBlackout));
    assert_eq!(sim.open_positions()[0].opened_bar, 2);
}

#[test]
fn close_on_news_flattens_inside_the_window() {
    let mut cfg = config(500.0);
    cfg.news.close_on_news = true;
    // 01:30 - 30 min = 01:00 = bar 4
    let calendar = NewsCalendar::new(news_at(at_bar(6)), &cfg.news);
    let mut sim = simulator(&cfg, calendar);
    let trades = step_all(&mut sim, &uptrend(6));

    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.status == PositionStatus::ClosedByNews));
    assert!(trades.iter().all(|t| t.exit_bar == 4));
    assert!(sim.open_positions().is_empty());
}

// ── Reversal and session end ─────────────────────────────────────────

#[test]
fn reversal_closes_longs_at_the_close_and_opens_short() {
    let cfg = config(20.0);
    let mut sim = simulator(&cfg, NewsCalendar::disabled());
    let mut data = reference();
    data.push((1.1010, 1.1022, 1.1008, 1.1020));
    // closes below the 1.0990 flip level without touching the 200 USD budget
    data.push((1.1020, 1.1025, 1.0985, 1.0988));
    let trades = step_all(&mut sim, &bars(&data));

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, PositionStatus::ClosedByReversal);
    assert_eq!(trades[0].exit_price, 1.0988);
    assert!((trades[0].realized_pnl + 105.6).abs() < 1e-6);

    let state = sim.trend_state();
    assert_eq!(state.bias, Bias::Bearish);
    // anchored on the last bullish candle (bar 2)
    assert_eq!(state.mitigation_high, Some(1.1022));

    let open = sim.open_positions();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].direction, Direction::Short);
    assert_eq!(open[0].stop_reference, 1.1022);
}

#[test]
fn session_end_flattens_and_skips_entry() {
    let mut cfg = config(500.0);
    cfg.trading_hours = TradingHours::new(0, 1);
    cfg.close_at_session_end = true;
    let mut sim = simulator(&cfg, NewsCalendar::disabled());
    // bar 3 (00:45) is the last bar of the session
    let trades = step_all(&mut sim, &uptrend(4));

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, PositionStatus::ClosedBySessionEnd);
    assert_eq!(trades[0].exit_bar, 3);
    assert!(sim.open_positions().is_empty());
    assert_eq!(sim.stats().rejections.get(&Rejection::OutsideTradingHours), Some(&2));
    assert_eq!(sim.stats().exits.get("session_end"), Some(&1));
}

// ── Run boundary ─────────────────────────────────────────────────────

#[test]
fn short_series_is_insufficient_history() {
    let cfg = config(15.0);
    let err = run_backtest(&bars(&reference()), &eurusd(), Timeframe::M15, &cfg, Arc::new(NewsCalendar::disabled()))
        .unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Data(DataError::InsufficientHistory { needed: 3, available: 2 })
    ));
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let mut cfg = config(15.0);
    cfg.risk.risk_per_candle_pct = 5.0;
    let err = run_backtest(&uptrend(5), &eurusd(), Timeframe::M15, &cfg, Arc::new(NewsCalendar::disabled()))
        .unwrap_err();
    assert!(matches!(err, BacktestError::Config(_)));
}

#[test]
fn run_result_accounts_for_every_position() {
    let cfg = config(15.0);
    let result = run_backtest(&uptrend(30), &eurusd(), Timeframe::M15, &cfg, Arc::new(NewsCalendar::disabled()))
        .unwrap();

    assert_eq!(result.trades.len(), result.stats.positions_opened);
    assert_eq!(result.metrics.trade_count, result.trades.len());
    assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
    let pnl: f64 = result.trades.iter().map(|t| t.realized_pnl).sum();
    assert!((result.metrics.final_equity - 10_000.0 - pnl).abs() < 1e-6);
    assert!(result.trades.iter().all(|t| t.status.is_terminal()));
    assert_eq!(result.start, at_bar(0));
    assert_eq!(result.end, at_bar(31));
}
