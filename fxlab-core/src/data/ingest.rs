//! Bar CSV ingestion and series validation.
//!
//! Accepts the terminal export layout (`time,open,high,low,close,tick_volume,
//! spread,real_volume`) or any CSV whose header names those price columns.
//! Every bar is validated here so the engine never sees a malformed series.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc, Weekday};
use std::io::{Read, Write};
use std::path::Path;

use super::provider::DataError;
use crate::domain::{Bar, Timeframe};

/// Longest gap treated as the weekend market closure.
/// Friday hour (UTC) from which the weekend closure may begin.
const WEEKEND_CLOSE_HOUR: u32 = 20;

/// Read and parse a bar CSV file.
pub fn read_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path)?;
    parse_bars(file)
}

/// Parse bars from any CSV reader with a header row.
pub fn parse_bars<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |names: &[&str]| -> Result<usize, DataError> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
            .ok_or_else(|| DataError::Malformed {
                row: 1,
                reason: format!("missing column '{}'", names[0]),
            })
    };
    let time_col = column(&["time", "timestamp", "datetime", "date"])?;
    let open_col = column(&["open"])?;
    let high_col = column(&["high"])?;
    let low_col = column(&["low"])?;
    let close_col = column(&["close"])?;

    let mut bars = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        // header is row 1
        let row = i + 2;
        let record = record?;

        let field = |col: usize| record.get(col).unwrap_or("");
        let timestamp = parse_timestamp(field(time_col)).ok_or_else(|| DataError::Malformed {
            row,
            reason: format!("unrecognized timestamp '{}'", field(time_col)),
        })?;
        let price = |col: usize, name: &str| -> Result<f64, DataError> {
            field(col).parse::<f64>().map_err(|_| DataError::Malformed {
                row,
                reason: format!("{name} '{}' is not a number", field(col)),
            })
        };

        let bar = Bar::new(
            timestamp,
            price(open_col, "open")?,
            price(high_col, "high")?,
            price(low_col, "low")?,
            price(close_col, "close")?,
        );
        bar.validate()
            .map_err(|source| DataError::InvalidBar { row, source })?;
        bars.push(bar);
    }

    Ok(bars)
}

/// Parse `YYYY-MM-DD HH:MM[:SS]`, `YYYY.MM.DD HH:MM[:SS]`, RFC 3339, or Unix seconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y.%m.%d %H:%M:%S",
        "%Y.%m.%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Check ordering, alignment and continuity of a bar series.
///
/// Timestamps must strictly increase and sit on the timeframe grid. More than
/// `max_missing_bars` missing bars is an error. Slots inside the weekend
/// closure do not count as missing.
pub fn validate_series(
    bars: &[Bar],
    timeframe: Timeframe,
    max_missing_bars: usize,
) -> Result<(), DataError> {
    let interval = timeframe.duration();
    let interval_secs = interval.num_seconds();

    for (index, bar) in bars.iter().enumerate() {
        if bar.timestamp.timestamp().rem_euclid(interval_secs) != 0 {
            return Err(DataError::DataGap {
                index,
                timestamp: bar.timestamp,
                reason: format!("timestamp not aligned to {timeframe} grid"),
            });
        }
        if index == 0 {
            continue;
        }

        let prev = bars[index - 1].timestamp;
        let delta = bar.timestamp - prev;
        if delta <= Duration::zero() {
            let reason = if delta == Duration::zero() {
                "duplicate timestamp".to_string()
            } else {
                format!("timestamp goes backwards from {prev}")
            };
            return Err(DataError::DataGap {
                index,
                timestamp: bar.timestamp,
                reason,
            });
        }

        let missing = (delta.num_seconds() / interval_secs - 1) as usize;
        if missing > max_missing_bars
            && missing_outside_closure(prev, bar.timestamp, interval, max_missing_bars) > max_missing_bars
        {
            return Err(DataError::DataGap {
                index,
                timestamp: bar.timestamp,
                reason: format!(
                    "{missing} missing bar(s) after {prev} (allowed {max_missing_bars})"
                ),
            });
        }
    }
    Ok(())
}

/// Fail unless at least `needed` bars are present.
pub fn require_history(bars: &[Bar], needed: usize) -> Result<(), DataError> {
    if bars.len() < needed {
        return Err(DataError::InsufficientHistory {
            needed,
            available: bars.len(),
        });
    }
    Ok(())
}

/// Bars missing between `prev` and `next`, not counting slots inside the
/// weekend closure (Friday 20:00 UTC through Sunday 23:59 UTC).
///
/// Stops counting once `limit` is exceeded.
fn missing_outside_closure(prev: DateTime<Utc>, next: DateTime<Utc>, interval: Duration, limit: usize) -> usize {
    let mut missing = 0;
    let mut slot = prev + interval;
    while slot < next {
        if !in_weekend_closure(slot) {
            missing += 1;
            if missing > limit {
                break;
            }
        }
        slot += interval;
    }
    missing
}

fn in_weekend_closure(ts: DateTime<Utc>) -> bool {
    match ts.weekday() {
        Weekday::Fri => ts.hour() >= WEEKEND_CLOSE_HOUR,
        Weekday::Sat | Weekday::Sun => true,
        _ => false,
    }
}

/// Write bars in the terminal export layout.
pub fn write_bars_csv<W: Write>(writer: W, bars: &[Bar]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["time", "open", "high", "low", "close"])?;
    for bar in bars {
        wtr.write_record([
            bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
