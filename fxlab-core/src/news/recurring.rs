//! Approximate schedule of the recurring US releases that move every pair.
//!
//! Dates are the usual slots, not the official calendar: payrolls on the first
//! Friday, CPI on the 13th, and FOMC statements on the 15th of meeting months.

use chrono::{Datelike, NaiveDate, TimeZone, Utc, Weekday};

use super::event::{Impact, NewsEvent};

const FOMC_MONTHS: [u32; 8] = [1, 3, 5, 6, 7, 9, 11, 12];

/// High-impact NFP, CPI and FOMC events for each given year.
pub fn recurring_events(years: &[i32]) -> Vec<NewsEvent> {
    let mut events = Vec::new();
    for &year in years {
        for month in 1..=12 {
            if let Some(day) = first_weekday(year, month, Weekday::Fri) {
                push_event(&mut events, year, month, day, 13, 30, "NFP");
            }
            push_event(&mut events, year, month, 13, 13, 30, "CPI");
            if FOMC_MONTHS.contains(&month) {
                push_event(&mut events, year, month, 15, 19, 0, "FOMC");
            }
        }
    }
    events.sort_by_key(|e| e.timestamp);
    events
}

fn push_event(events: &mut Vec<NewsEvent>, year: i32, month: u32, day: u32, hour: u32, minute: u32, name: &str) {
    if let Some(ts) = Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single() {
        events.push(NewsEvent::new(ts, Impact::High, name));
    }
}

fn first_weekday(year: i32, month: u32, weekday: Weekday) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    Some(1 + offset)
}
