//! Scheduled-news blackout filter.

pub mod calendar;
pub mod event;
pub mod parse;
pub mod recurring;

pub use calendar::NewsCalendar;
pub use event::{Impact, NewsEvent};
pub use parse::{load_news_file, parse_news, NewsDataParseError};
pub use recurring::recurring_events;
