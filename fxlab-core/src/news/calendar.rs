//! News blackout calendar.
//!
//! High-impact events become closed intervals `[ts - pre, ts + post]`, sorted by
//! start. A prefix maximum of interval ends turns "is `t` inside any interval"
//! into one binary search: the intervals starting at or before `t` cover it iff
//! the largest end among them is `>= t`.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use super::event::{Impact, NewsEvent};
use crate::config::NewsConfig;

#[derive(Debug, Clone)]
struct Blackout {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    event: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NewsCalendar {
    enabled: bool,
    events: Vec<NewsEvent>,
    blackouts: Vec<Blackout>,
    /// `max_end[i]` = max end of `blackouts[..=i]`.
    max_end: Vec<DateTime<Utc>>,
}

impl NewsCalendar {
    /// Build the calendar. Low and Medium impact events are kept for reference
    /// but never block.
    pub fn new(mut events: Vec<NewsEvent>, config: &NewsConfig) -> Self {
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));

        let mut blackouts: Vec<Blackout> = events
            .iter()
            .enumerate()
            .filter(|(_, ev)| ev.impact == Impact::High)
            .map(|(i, ev)| {
                let mut start = ev.timestamp - ev.pre_window(config.pre_window());
                let mut end = ev.timestamp + ev.post_window(config.post_window());
                if config.full_day_blackout && ev.full_day {
                    let day_start = ev.timestamp.date_naive().and_time(NaiveTime::MIN).and_utc();
                    let day_end = day_start + Duration::days(1) - Duration::nanoseconds(1);
                    start = start.min(day_start);
                    end = end.max(day_end);
                }
                Blackout { start, end, event: i }
            })
            .collect();
        blackouts.sort_by_key(|b| b.start);

        let mut max_end = Vec::with_capacity(blackouts.len());
        for b in &blackouts {
            let running = match max_end.last() {
                Some(&prev) if prev > b.end => prev,
                _ => b.end,
            };
            max_end.push(running);
        }

        Self {
            enabled: config.enabled,
            events,
            blackouts,
            max_end,
        }
    }

    /// A calendar that never blocks.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }

    pub fn high_impact_count(&self) -> usize {
        self.blackouts.len()
    }

    /// True iff `timestamp` lies inside a high-impact blackout window.
    pub fn is_blocked(&self, timestamp: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let idx = self.blackouts.partition_point(|b| b.start <= timestamp);
        idx > 0 && self.max_end[idx - 1] >= timestamp
    }

    /// The event whose window covers `timestamp`, latest-starting first.
    pub fn blocking_event(&self, timestamp: DateTime<Utc>) -> Option<&NewsEvent> {
        if !self.enabled {
            return None;
        }
        let idx = self.blackouts.partition_point(|b| b.start <= timestamp);
        for j in (0..idx).rev() {
            if self.max_end[j] < timestamp {
                break;
            }
            if self.blackouts[j].end >= timestamp {
                return Some(&self.events[self.blackouts[j].event]);
            }
        }
        None
    }

    /// Next event of any impact strictly after `timestamp`.
    pub fn next_event_after(&self, timestamp: DateTime<Utc>) -> Option<&NewsEvent> {
        let idx = self.events.partition_point(|ev| ev.timestamp <= timestamp);
        self.events.get(idx)
    }
}
