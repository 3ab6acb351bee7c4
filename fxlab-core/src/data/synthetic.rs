//! Seeded synthetic bar generator.
//!
//! Produces a regime-switching random walk on the timeframe grid, skipping
//! weekends. Same seed and request → identical bars, so it doubles as an
//! offline stand-in for the terminal in tests and demos.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult};
use crate::domain::{Bar, Pair};
use chrono::{Datelike, Weekday};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    /// Typical bar range, in pips.
    volatility_pips: f64,
    /// Bars per drift regime.
    regime_length: usize,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            volatility_pips: 4.0,
            regime_length: 48,
        }
    }

    pub fn with_volatility(mut self, pips: f64) -> Self {
        self.volatility_pips = pips;
        self
    }

    /// Per-pair seed so different pairs never share a path.
    fn rng_for(&self, pair: &Pair) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(pair.symbol().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        StdRng::seed_from_u64(u64::from_le_bytes(bytes))
    }

    fn starting_price(pair: &Pair) -> f64 {
        if pair.quote() == "JPY" {
            150.0
        } else {
            1.10
        }
    }

    pub fn generate(&self, request: &FetchRequest) -> Vec<Bar> {
        let pair = &request.pair;
        let pip = pair.pip_size();
        let step = request.timeframe.duration();
        let (from, to) = request.bounds();
        let mut rng = self.rng_for(pair);

        let mut bars = Vec::new();
        let mut price = Self::starting_price(pair);
        let mut drift = 0.0;
        let mut ts = from;
        while ts < to {
            if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
                ts += step;
                continue;
            }
            if bars.len() % self.regime_length == 0 {
                drift = rng.gen_range(-0.6..0.6) * self.volatility_pips * pip;
            }

            let open = price;
            let body = drift + rng.gen_range(-1.0..1.0) * self.volatility_pips * pip;
            let close = (open + body).max(pip);
            let upper = rng.gen_range(0.0..0.5) * self.volatility_pips * pip;
            let lower = rng.gen_range(0.0..0.5) * self.volatility_pips * pip;
            let high = open.max(close) + upper;
            let low = (open.min(close) - lower).max(pip / 2.0);

            bars.push(Bar::new(ts, open, high, low, close));
            price = close;
            ts += step;
        }
        bars
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        let bars = self.generate(request);
        if bars.is_empty() {
            return Err(DataError::NoData {
                pair: request.pair.to_string(),
                timeframe: request.timeframe.to_string(),
            });
        }
        Ok(FetchResult {
            request: request.clone(),
            bars,
            source: DataSource::Synthetic,
        })
    }
}
