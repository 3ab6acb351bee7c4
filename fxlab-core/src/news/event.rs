use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Impact rating of a scheduled release. Only `High` blocks trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl FromStr for Impact {
    type Err = String;

    /// Accepts names (`high`, `Medium`) or the 1–3 star rating.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Impact::Low),
            "medium" | "med" | "2" => Ok(Impact::Medium),
            "high" | "3" => Ok(Impact::High),
            other => Err(format!("unknown impact level '{other}'")),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        };
        f.write_str(s)
    }
}

/// A scheduled economic release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub timestamp: DateTime<Utc>,
    pub impact: Impact,
    pub name: String,
    /// Overrides the configured pre-event window when set.
    pub pre_window_minutes: Option<i64>,
    /// Overrides the configured post-event window when set.
    pub post_window_minutes: Option<i64>,
    /// Releases that move the market all day (payrolls, rate decisions).
    pub full_day: bool,
}

impl NewsEvent {
    pub fn new(timestamp: DateTime<Utc>, impact: Impact, name: &str) -> Self {
        Self {
            timestamp,
            impact,
            name: name.to_string(),
            pre_window_minutes: None,
            post_window_minutes: None,
            full_day: is_full_day_release(name),
        }
    }

    pub fn with_windows(mut self, pre_minutes: Option<i64>, post_minutes: Option<i64>) -> Self {
        self.pre_window_minutes = pre_minutes;
        self.post_window_minutes = post_minutes;
        self
    }

    pub fn pre_window(&self, default: Duration) -> Duration {
        self.pre_window_minutes.map(Duration::minutes).unwrap_or(default)
    }

    pub fn post_window(&self, default: Duration) -> Duration {
        self.post_window_minutes.map(Duration::minutes).unwrap_or(default)
    }
}

/// NFP and FOMC days are blocked whole when full-day blackout is on.
fn is_full_day_release(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.contains("FOMC") || upper.contains("NFP") || upper.contains("NON-FARM EMPLOYMENT CHANGE")
}
