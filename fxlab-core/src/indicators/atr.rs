//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! The first bar has no previous close, so the seed is the mean of TR[1..=period]
//! and the first value appears on bar `period`.

use crate::domain::Bar;

/// Streaming ATR, fed one bar at a time by the simulator.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed the next bar; returns the ATR once warmed up.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let Some(prev_close) = self.prev_close.replace(bar.close) else {
            return None;
        };
        let tr = bar_true_range(bar, prev_close);

        match self.value {
            Some(prev) => {
                let alpha = 1.0 / self.period as f64;
                self.value = Some(alpha * tr + (1.0 - alpha) * prev);
            }
            None => {
                self.seed_sum += tr;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

fn bar_true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(bar.high - bar.low);
        } else {
            tr.push(bar_true_range(bar, bars[i - 1].close));
        }
    }
    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
/// Seed: mean of the first `period` values starting at `start`; earlier
/// outputs are NaN.
pub fn wilder_smooth(values: &[f64], period: usize, start: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < start + period {
        return result;
    }

    let seed_end = start + period;
    let seed = values[start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| {
                Bar::new(base + Duration::minutes(15 * i as i64), open, high, low, close)
            })
            .collect()
    }

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0);
        assert_approx(tr[1], 8.0);
        assert_approx(tr[2], 9.0);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        assert_approx(true_range(&bars)[1], 15.0);
    }

    #[test]
    fn streaming_matches_batch() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 104.0, 97.0, 103.0),
            (103.0, 110.0, 101.0, 109.0),
            (109.0, 111.0, 104.0, 105.0),
        ]);
        let batch = wilder_smooth(&true_range(&bars), 3, 1);

        let mut atr = Atr::new(3);
        for (i, bar) in bars.iter().enumerate() {
            let value = atr.update(bar);
            if batch[i].is_nan() {
                assert!(value.is_none(), "bar {i} should still be warming up");
            } else {
                assert_approx(value.unwrap(), batch[i]);
            }
        }
        // seed = mean(8, 9, 7) = 8 on bar 3
        assert_approx(batch[3], 8.0);
    }

    #[test]
    fn warmup_length() {
        let bars = make_ohlc_bars(&[(1.0, 1.1, 0.9, 1.0); 5]);
        let mut atr = Atr::new(4);
        let outputs: Vec<_> = bars.iter().map(|b| atr.update(b)).collect();
        assert!(outputs[..4].iter().all(Option::is_none));
        assert_approx(outputs[4].unwrap(), 0.2);
    }
}
