//! iCalendar feed reading.
//!
//! Feeds are only read, never written: this module exposes the VEVENTs of a
//! payload to the parsers and a small summary used by `inspect`.

mod parse;

use chrono::{DateTime, Utc};

use crate::error::ParseError;

pub use parse::{Feed, FeedCalendar, RawEvent, unescape_text};

/// Overview of a feed: how many events and which period they span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    pub count: usize,
    pub first_start: Option<DateTime<Utc>>,
    pub last_start: Option<DateTime<Utc>>,
}

pub fn summarize(payload: &str) -> Result<FeedSummary, ParseError> {
    let feed = Feed::new(payload);
    let calendar = feed.read()?;

    let mut summary = FeedSummary {
        count: 0,
        first_start: None,
        last_start: None,
    };
    for event in calendar.events() {
        let start = event.date("DTSTART")?;
        summary.count += 1;
        summary.first_start = Some(summary.first_start.map_or(start, |s| s.min(start)));
        summary.last_start = Some(summary.last_start.map_or(start, |s| s.max(start)));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_summary_spans_all_starts() {
        let payload = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n\
BEGIN:VEVENT\r\nUID:b\r\nDTSTART:20250322T080000Z\r\nDTEND:20250322T090000Z\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250320T080000Z\r\nDTEND:20250320T090000Z\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n";

        let summary = summarize(payload).unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(
            summary.first_start,
            Some(Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap())
        );
        assert_eq!(
            summary.last_start,
            Some(Utc.with_ymd_and_hms(2025, 3, 22, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_calendar_has_no_bounds() {
        let summary = summarize("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n").unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.first_start, None);
    }
}
