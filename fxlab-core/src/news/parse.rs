//! News table parsing.
//!
//! CSV with a header row: `timestamp,impact,name[,pre_window_minutes,post_window_minutes]`.
//! Empty window cells fall back to the configured defaults.

use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use super::event::{Impact, NewsEvent};
use crate::config::MAX_NEWS_WINDOW_MINUTES;
use crate::data::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed news table at line {line}: {reason}")]
pub struct NewsDataParseError {
    pub line: u64,
    pub reason: String,
}

impl NewsDataParseError {
    fn new(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for NewsDataParseError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line()).unwrap_or(0);
        NewsDataParseError::new(line, e.to_string())
    }
}

/// Parse a news table from any reader.
pub fn parse_news<R: Read>(reader: R) -> Result<Vec<NewsEvent>, NewsDataParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut events = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() < 3 {
            return Err(NewsDataParseError::new(
                line,
                format!("expected at least 3 fields, found {}", record.len()),
            ));
        }

        let raw_ts = &record[0];
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| NewsDataParseError::new(line, format!("bad timestamp '{raw_ts}'")))?;
        let impact: Impact = record[1]
            .parse()
            .map_err(|reason: String| NewsDataParseError::new(line, reason))?;
        let name = &record[2];
        if name.is_empty() {
            return Err(NewsDataParseError::new(line, "empty event name"));
        }

        let window = |idx: usize, label: &str| -> Result<Option<i64>, NewsDataParseError> {
            match record.get(idx) {
                None | Some("") => Ok(None),
                Some(raw) => match raw.parse::<i64>() {
                    Ok(minutes) if (0..=MAX_NEWS_WINDOW_MINUTES).contains(&minutes) => Ok(Some(minutes)),
                    _ => Err(NewsDataParseError::new(
                        line,
                        format!("{label} '{raw}' is not a number of minutes in 0..={MAX_NEWS_WINDOW_MINUTES}"),
                    )),
                },
            }
        };
        let pre = window(3, "pre_window_minutes")?;
        let post = window(4, "post_window_minutes")?;

        events.push(NewsEvent::new(timestamp, impact, name).with_windows(pre, post));
    }
    Ok(events)
}

/// Load a news file. A missing file is not an error: the run continues with
/// no blackouts and a warning. A present but malformed file is.
pub fn load_news_file(path: &Path) -> Result<Option<Vec<NewsEvent>>, NewsDataParseError> {
    match std::fs::File::open(path) {
        Ok(file) => parse_news(file).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "news file not found; news filter will not block");
            Ok(None)
        }
        Err(e) => Err(NewsDataParseError::new(0, format!("{}: {e}", path.display()))),
    }
}
