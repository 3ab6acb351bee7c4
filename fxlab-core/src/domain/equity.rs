use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of the realized equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    /// Peak equity minus current equity (account currency, >= 0).
    pub drawdown_from_peak: f64,
}

impl EquityPoint {
    /// Drawdown as a fraction of the peak it is measured from.
    pub fn drawdown_pct(&self) -> f64 {
        let peak = self.equity + self.drawdown_from_peak;
        if peak <= 0.0 {
            return 0.0;
        }
        self.drawdown_from_peak / peak
    }
}
